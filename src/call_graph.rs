use std::hash::Hash;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexSet;
use smallvec::SmallVec;

use crate::program::CallKind;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Edge<CS, M> {
    pub kind: CallKind,
    pub call_site: CS,
    pub callee: M,
}

impl<CS, M> Edge<CS, M> {
    pub fn new(kind: CallKind, call_site: CS, callee: M) -> Self {
        Self {
            kind,
            call_site,
            callee,
        }
    }
}

/// Call graph over call sites `CS` and methods `M`. The same structure holds
/// the context-sensitive graph of the solver, its context-insensitive
/// projection and the class-hierarchy graph.
///
/// The graph only grows: methods and edges are never removed.
#[derive(Debug)]
pub struct CallGraph<CS, M> {
    entry_methods: IndexSet<M>,
    reachable_methods: IndexSet<M>,
    edges: IndexSet<Edge<CS, M>>,
    /// Edges are unique per call site and callee, whatever their kind.
    targets: HashSet<(CS, M)>,
    callees: HashMap<CS, SmallVec<[M; 2]>>,
    callers: HashMap<M, Vec<CS>>,
    call_site_containers: HashMap<CS, M>,
}

impl<CS, M> Default for CallGraph<CS, M> {
    fn default() -> Self {
        Self {
            entry_methods: IndexSet::new(),
            reachable_methods: IndexSet::new(),
            edges: IndexSet::new(),
            targets: HashSet::new(),
            callees: HashMap::new(),
            callers: HashMap::new(),
            call_site_containers: HashMap::new(),
        }
    }
}

impl<CS, M> CallGraph<CS, M>
where
    CS: Copy + Eq + Hash,
    M: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry_method(&mut self, method: M) {
        self.entry_methods.insert(method);
    }

    /// Returns whether `method` was not reachable before.
    pub fn add_reachable_method(&mut self, method: M) -> bool {
        self.reachable_methods.insert(method)
    }

    /// Records that `call_site` lives in `method`, so that callers can be
    /// reported as methods.
    pub fn set_container(&mut self, call_site: CS, method: M) {
        self.call_site_containers.insert(call_site, method);
    }

    /// Returns whether the edge is new. At most one edge exists per pair of
    /// call site and callee.
    pub fn add_edge(&mut self, edge: Edge<CS, M>) -> bool {
        if !self.targets.insert((edge.call_site, edge.callee)) {
            return false;
        }
        self.edges.insert(edge);
        self.callees
            .entry(edge.call_site)
            .or_default()
            .push(edge.callee);
        self.callers
            .entry(edge.callee)
            .or_default()
            .push(edge.call_site);
        true
    }

    pub fn contains_method(&self, method: M) -> bool {
        self.reachable_methods.contains(&method)
    }

    pub fn has_edge(&self, call_site: CS, callee: M) -> bool {
        self.targets.contains(&(call_site, callee))
    }

    pub fn entry_methods(&self) -> impl Iterator<Item = M> + '_ {
        self.entry_methods.iter().copied()
    }

    pub fn reachable_methods(&self) -> impl Iterator<Item = M> + '_ {
        self.reachable_methods.iter().copied()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge<CS, M>> + '_ {
        self.edges.iter()
    }

    pub fn callees_of(&self, call_site: CS) -> &[M] {
        self.callees.get(&call_site).map(|c| c.as_slice()).unwrap_or(&[])
    }

    fn call_sites_calling(&self, method: M) -> &[CS] {
        self.callers.get(&method).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Methods containing a call site that calls `method`.
    pub fn callers_of(&self, method: M) -> impl Iterator<Item = M> + '_ {
        self.call_sites_calling(method)
            .iter()
            .filter_map(|cs| self.call_site_containers.get(cs).copied())
    }

    pub fn container_of(&self, call_site: CS) -> Option<M> {
        self.call_site_containers.get(&call_site).copied()
    }

    pub fn num_reachable_methods(&self) -> usize {
        self.reachable_methods.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
}
