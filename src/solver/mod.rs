//! Context-sensitive, flow-insensitive points-to solver with on-the-fly call
//! graph construction.
//!
//! The solver keeps a single work list of pending points-to facts and pending
//! call edges and runs it to a fixpoint. New methods become reachable only
//! through call edges popped from that list, so growth of the call graph and
//! propagation of points-to sets never recurse into each other.

use std::time::Instant;

use log::{debug, info, trace, warn};

use crate::call_graph::{CallGraph, Edge};
use crate::error::AnalysisError;
use crate::program::{CallKind, InvokeId, MethodId, Program, Stmt, VarId};

pub mod context;
pub mod heap;
pub mod manager;
pub mod pfg;
pub mod pts;
pub mod stats;
#[cfg(test)]
mod tests;
pub mod worklist;

use context::{ContextSelector, Receiver};
use heap::HeapModel;
use manager::{
    ContextId, CsCallSite, CsCallSiteId, CsManager, CsMethod, CsMethodId, CsObj, CsObjId, Pointer,
    PointerId,
};
use pfg::PointerFlowGraph;
use pts::PointsToSet;
use stats::SolverStats;
use worklist::{CsEdge, WorkItem, WorkList, WorkOrder};

/// Everything the solver computed, handed over once the fixpoint is reached.
#[derive(Debug)]
pub struct Solution {
    pub manager: CsManager,
    pub pfg: PointerFlowGraph,
    pub call_graph: CallGraph<CsCallSiteId, CsMethodId>,
    pub stats: SolverStats,
}

pub struct Solver<'a, S, H>
where
    S: ContextSelector + ?Sized,
    H: HeapModel + ?Sized,
{
    program: &'a Program,
    selector: &'a S,
    heap_model: &'a H,
    manager: CsManager,
    pfg: PointerFlowGraph,
    call_graph: CallGraph<CsCallSiteId, CsMethodId>,
    worklist: WorkList,
    max_iterations: Option<u64>,
    stats: SolverStats,
}

impl<'a, S, H> Solver<'a, S, H>
where
    S: ContextSelector + ?Sized,
    H: HeapModel + ?Sized,
{
    pub fn new(program: &'a Program, selector: &'a S, heap_model: &'a H) -> Self {
        Self {
            program,
            selector,
            heap_model,
            manager: CsManager::new(),
            pfg: PointerFlowGraph::new(),
            call_graph: CallGraph::new(),
            worklist: WorkList::new(WorkOrder::default()),
            max_iterations: None,
            stats: SolverStats::default(),
        }
    }

    pub fn with_work_order(mut self, order: WorkOrder) -> Self {
        self.worklist = WorkList::new(order);
        self
    }

    /// Aborts the analysis once more than `limit` work items were processed.
    pub fn with_max_iterations(mut self, limit: Option<u64>) -> Self {
        self.max_iterations = limit;
        self
    }

    pub fn solve(mut self) -> Result<Solution, AnalysisError> {
        let start = Instant::now();
        info!(
            "Solving points-to sets from {} with {:?}",
            self.program.method_signature(self.program.entry_method()),
            self.selector
        );
        self.initialize();
        if let Err(e) = self.analyze() {
            warn!("{e}");
            return Err(e);
        }
        #[cfg(debug_assertions)]
        self.check_fixpoint();

        self.stats.elapsed = start.elapsed();
        self.stats.collect(&self.manager, &self.pfg, &self.call_graph);
        info!("Reached fixpoint\n{}", self.stats);

        Ok(Solution {
            manager: self.manager,
            pfg: self.pfg,
            call_graph: self.call_graph,
            stats: self.stats,
        })
    }

    fn initialize(&mut self) {
        let context = self.manager.context_id(self.selector.empty_context());
        let entry = self.manager.cs_method(context, self.program.entry_method());
        self.call_graph.add_entry_method(entry);
        self.add_reachable(entry);
    }

    /// Processes the statements of a method that do not depend on points-to
    /// information. Does nothing if the method already is reachable.
    fn add_reachable(&mut self, cs_method: CsMethodId) {
        if !self.call_graph.add_reachable_method(cs_method) {
            return;
        }
        let program = self.program;
        let CsMethod { context, method } = self.manager.cs_method_value(cs_method);
        trace!(
            "Reachable: {} under {}",
            program.method_signature(method),
            self.manager.context(context)
        );

        for stmt in &program.method(method).stmts {
            match *stmt {
                Stmt::New(site) => {
                    let obj = self.heap_model.get_obj(program, site);
                    let heap_context = self
                        .selector
                        .select_heap_context(self.manager.context(context), &obj);
                    let heap_context = self.manager.context_id(heap_context);
                    let obj = self.manager.obj_id(obj);
                    let cs_obj = self.manager.cs_obj(heap_context, obj);
                    let lhs = self.manager.cs_var(context, program.alloc(site).lhs);
                    self.worklist
                        .add_points_to(lhs, PointsToSet::singleton(cs_obj));
                }
                Stmt::Copy { lhs, rhs } => {
                    let source = self.manager.cs_var(context, rhs);
                    let target = self.manager.cs_var(context, lhs);
                    self.add_pfg_edge(source, target);
                }
                Stmt::LoadStatic { lhs, field } => {
                    let source = self.manager.static_field(field);
                    let target = self.manager.cs_var(context, lhs);
                    self.add_pfg_edge(source, target);
                }
                Stmt::StoreStatic { field, rhs } => {
                    let source = self.manager.cs_var(context, rhs);
                    let target = self.manager.static_field(field);
                    self.add_pfg_edge(source, target);
                }
                Stmt::Invoke(invoke) if program.invoke(invoke).is_static() => {
                    self.process_static_call(context, invoke)
                }
                _ => {}
            }
        }
    }

    /// Returns whether the edge is new. Objects already in `source` are sent
    /// on to `target` right away, since they will not be propagated again.
    fn add_pfg_edge(&mut self, source: PointerId, target: PointerId) -> bool {
        if !self.pfg.add_edge(source, target) {
            return false;
        }
        let pts = self.manager.points_to(source);
        if !pts.is_empty() {
            self.worklist.add_points_to(target, pts.clone());
        }
        true
    }

    fn analyze(&mut self) -> Result<(), AnalysisError> {
        while let Some(item) = self.worklist.poll() {
            self.stats.iterations += 1;
            if let Some(limit) = self.max_iterations {
                if self.stats.iterations > limit {
                    return Err(AnalysisError::IterationLimitExceeded(limit));
                }
            }

            match item {
                WorkItem::PointsTo(pointer, pts) => {
                    let delta = self.propagate(pointer, &pts);
                    if let Pointer::Var { context, var } = self.manager.pointer_value(pointer) {
                        for obj in delta.iter() {
                            self.process_instance_accesses(context, var, obj);
                            self.process_call(context, var, obj);
                        }
                    }
                }
                WorkItem::CallEdge(edge) => self.process_call_edge(edge),
            }
        }
        Ok(())
    }

    /// Adds the objects of `pts` missing from `pointer` and forwards exactly
    /// those to the successors of `pointer`. Returns them.
    fn propagate(&mut self, pointer: PointerId, pts: &PointsToSet) -> PointsToSet {
        let current = self.manager.points_to_mut(pointer);
        let delta = pts.difference(current);
        if !delta.is_empty() {
            current.union_assign(&delta);
            for succ in self.pfg.succs_of(pointer) {
                self.worklist.add_points_to(succ, delta.clone());
            }
        }
        delta
    }

    /// Connects the field and array accesses through `var` to the cells of
    /// the newly discovered object `obj`.
    fn process_instance_accesses(&mut self, context: ContextId, var: VarId, obj: CsObjId) {
        let program = self.program;
        let uses = program.var(var).uses();
        for &(field, rhs) in &uses.store_fields {
            let source = self.manager.cs_var(context, rhs);
            let target = self.manager.instance_field(obj, field);
            self.add_pfg_edge(source, target);
        }
        for &(lhs, field) in &uses.load_fields {
            let source = self.manager.instance_field(obj, field);
            let target = self.manager.cs_var(context, lhs);
            self.add_pfg_edge(source, target);
        }
        for &rhs in &uses.store_arrays {
            let source = self.manager.cs_var(context, rhs);
            let target = self.manager.array_index(obj);
            self.add_pfg_edge(source, target);
        }
        for &lhs in &uses.load_arrays {
            let source = self.manager.array_index(obj);
            let target = self.manager.cs_var(context, lhs);
            self.add_pfg_edge(source, target);
        }
    }

    fn process_static_call(&mut self, context: ContextId, invoke_id: InvokeId) {
        let program = self.program;
        let invoke = program.invoke(invoke_id);
        let Some(callee) = program.resolve_callee(None, invoke) else {
            debug!(
                "Static call {} has no target",
                program.invoke_signature(invoke_id)
            );
            return;
        };
        let callee_context =
            self.selector
                .select_call_context(self.manager.context(context), invoke_id, None, callee);
        let callee_context = self.manager.context_id(callee_context);
        self.queue_call_edge(invoke.kind, context, invoke_id, callee_context, callee);
    }

    /// Dispatches every instance call on `var` for the newly discovered
    /// receiver object `recv`.
    fn process_call(&mut self, context: ContextId, var: VarId, recv: CsObjId) {
        let program = self.program;
        let CsObj {
            context: heap_context,
            obj,
        } = self.manager.cs_obj_value(recv);

        for &invoke_id in &program.var(var).uses().invokes {
            let invoke = program.invoke(invoke_id);
            let recv_obj = self.manager.obj(obj);
            let Some(callee) = program.resolve_callee(Some(recv_obj.ty), invoke) else {
                trace!(
                    "No target for {} on {}",
                    program.invoke_signature(invoke_id),
                    recv_obj.describe(program)
                );
                continue;
            };
            let receiver = Receiver {
                context: self.manager.context(heap_context),
                id: obj,
                obj: recv_obj,
            };
            let callee_context = self.selector.select_call_context(
                self.manager.context(context),
                invoke_id,
                Some(receiver),
                callee,
            );
            let callee_context = self.manager.context_id(callee_context);

            if let Some(this) = program.method(callee).this {
                let this = self.manager.cs_var(callee_context, this);
                self.worklist
                    .add_points_to(this, PointsToSet::singleton(recv));
            }
            self.queue_call_edge(invoke.kind, context, invoke_id, callee_context, callee);
        }
    }

    fn queue_call_edge(
        &mut self,
        kind: CallKind,
        caller_context: ContextId,
        invoke: InvokeId,
        callee_context: ContextId,
        callee: MethodId,
    ) {
        let call_site = self.manager.cs_call_site(caller_context, invoke);
        let callee = self.manager.cs_method(callee_context, callee);
        if !self.call_graph.has_edge(call_site, callee) {
            self.worklist.add_call_edge(Edge::new(kind, call_site, callee));
        }
    }

    /// Installs a pending call edge. A new edge makes the callee reachable
    /// and connects arguments to parameters and return values to the result.
    fn process_call_edge(&mut self, edge: CsEdge) {
        if !self.call_graph.add_edge(edge) {
            return;
        }
        let program = self.program;
        let CsCallSite {
            context: caller_context,
            invoke: invoke_id,
        } = self.manager.cs_call_site_value(edge.call_site);
        let CsMethod {
            context: callee_context,
            method: callee,
        } = self.manager.cs_method_value(edge.callee);
        let invoke = program.invoke(invoke_id);
        debug!(
            "Call edge ({}) {} {} -> {} {}",
            edge.kind,
            self.manager.context(caller_context),
            program.invoke_signature(invoke_id),
            self.manager.context(callee_context),
            program.method_signature(callee)
        );

        let caller = self.manager.cs_method(caller_context, invoke.container);
        debug_assert!(self.call_graph.contains_method(caller));
        self.call_graph.set_container(edge.call_site, caller);
        self.add_reachable(edge.callee);

        let callee = program.method(callee);
        for (&arg, &param) in invoke.args.iter().zip(&callee.params) {
            let source = self.manager.cs_var(caller_context, arg);
            let target = self.manager.cs_var(callee_context, param);
            self.add_pfg_edge(source, target);
        }
        if let Some(result) = invoke.result {
            let target = self.manager.cs_var(caller_context, result);
            for &ret in &callee.return_vars {
                let source = self.manager.cs_var(callee_context, ret);
                self.add_pfg_edge(source, target);
            }
        }
    }

    #[cfg(debug_assertions)]
    fn check_fixpoint(&self) {
        debug_assert!(self.worklist.is_empty());
        for (source, target) in self.pfg.edges() {
            debug_assert!(
                self.manager
                    .points_to(source)
                    .is_subset(self.manager.points_to(target)),
                "points-to set of {:?} does not cover its predecessor {:?}",
                self.manager.pointer_value(target),
                self.manager.pointer_value(source)
            );
        }
    }
}
