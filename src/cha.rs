//! Call graph construction from the class hierarchy alone. Virtual calls are
//! dispatched on every subtype of the declared receiver class, which makes
//! the result an upper bound of the call graph found by points-to analysis.

use std::collections::VecDeque;

use hashbrown::HashSet;
use log::{debug, info};

use crate::call_graph::{CallGraph, Edge};
use crate::program::{CallKind, Invoke, InvokeId, MethodId, Program, Stmt};

pub struct ChaBuilder;

impl ChaBuilder {
    pub fn build(program: &Program) -> CallGraph<InvokeId, MethodId> {
        let mut call_graph = CallGraph::new();
        let entry = program.entry_method();
        call_graph.add_entry_method(entry);

        let mut worklist = VecDeque::from([entry]);
        while let Some(method) = worklist.pop_front() {
            if !call_graph.add_reachable_method(method) {
                continue;
            }
            for stmt in &program.method(method).stmts {
                let Stmt::Invoke(invoke_id) = *stmt else {
                    continue;
                };
                let invoke = program.invoke(invoke_id);
                call_graph.set_container(invoke_id, method);
                for callee in Self::resolve(program, invoke) {
                    if call_graph.add_edge(Edge::new(invoke.kind, invoke_id, callee)) {
                        worklist.push_back(callee);
                    }
                }
            }
        }

        info!(
            "Class hierarchy call graph: {} reachable methods, {} edges",
            call_graph.num_reachable_methods(),
            call_graph.num_edges()
        );
        call_graph
    }

    /// Possible targets of `invoke` according to the class hierarchy.
    pub fn resolve(program: &Program, invoke: &Invoke) -> HashSet<MethodId> {
        let subsignature = &invoke.method_ref.subsignature;
        match invoke.kind {
            CallKind::Static | CallKind::Special => {
                program.resolve_callee(None, invoke).into_iter().collect()
            }
            CallKind::Virtual | CallKind::Interface => program
                .subtypes_of(invoke.method_ref.class)
                .into_iter()
                .filter(|&c| !program.class(c).is_interface())
                .filter_map(|c| program.dispatch(c, subsignature))
                .collect(),
            CallKind::Dynamic => {
                debug!("Skipping dynamic call to {subsignature}");
                HashSet::new()
            }
        }
    }
}
