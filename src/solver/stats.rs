use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use super::manager::{CsCallSiteId, CsManager, CsMethodId};
use super::pfg::PointerFlowGraph;
use crate::call_graph::CallGraph;

/// Size of the solved analysis state, plus how long it took to get there.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub iterations: u64,
    pub contexts: usize,
    pub objects: usize,
    pub cs_objects: usize,
    pub pointers: usize,
    pub pfg_edges: usize,
    pub call_edges: usize,
    pub reachable_methods: usize,
    pub elapsed: Duration,
}

impl SolverStats {
    pub(super) fn collect(
        &mut self,
        manager: &CsManager,
        pfg: &PointerFlowGraph,
        call_graph: &CallGraph<CsCallSiteId, CsMethodId>,
    ) {
        self.contexts = manager.num_contexts();
        self.objects = manager.num_objs();
        self.cs_objects = manager.num_cs_objs();
        self.pointers = manager.num_pointers();
        self.pfg_edges = pfg.num_edges();
        self.call_edges = call_graph.num_edges();
        self.reachable_methods = call_graph.num_reachable_methods();
    }
}

impl Display for SolverStats {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "Iterations: {}", self.iterations)?;
        writeln!(f, "Contexts: {}", self.contexts)?;
        writeln!(f, "Objects: {} ({} with context)", self.objects, self.cs_objects)?;
        writeln!(f, "Pointers: {}", self.pointers)?;
        writeln!(f, "PFG edges: {}", self.pfg_edges)?;
        writeln!(
            f,
            "Reachable context-sensitive methods: {}",
            self.reachable_methods
        )?;
        writeln!(f, "Call edges: {}", self.call_edges)?;
        write!(f, "Solving time: {:.3}s", self.elapsed.as_secs_f64())
    }
}
