use std::fmt::{self, Display, Formatter};

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;

use crate::call_graph::{CallGraph, Edge};
use crate::program::{FieldId, InvokeId, MethodId, Program, VarId};
use crate::solver::context::Context;
use crate::solver::heap::Obj;
use crate::solver::manager::{
    CsCallSiteId, CsMethodId, CsObj, CsObjId, ObjId, Pointer, PointerId,
};
use crate::solver::pts::PointsToSet;
use crate::solver::stats::SolverStats;
use crate::solver::Solution;

/// Queries over a finished analysis. Context-sensitive answers come straight
/// from the solver state; the context-insensitive views merge all contexts
/// of a variable and drop the heap contexts of objects.
#[derive(Debug)]
pub struct PointerAnalysisResult<'p> {
    program: &'p Program,
    solution: Solution,
    var_points_to: HashMap<VarId, HashSet<ObjId>>,
    call_graph: CallGraph<InvokeId, MethodId>,
}

impl<'p> PointerAnalysisResult<'p> {
    pub(crate) fn new(program: &'p Program, solution: Solution) -> Self {
        let mut var_points_to: HashMap<VarId, HashSet<ObjId>> = HashMap::new();
        for (id, pointer) in solution.manager.pointers() {
            if let Pointer::Var { var, .. } = pointer {
                let objs = project(&solution, solution.manager.points_to(id));
                var_points_to.entry(var).or_default().extend(objs);
            }
        }
        let call_graph = project_call_graph(program, &solution);
        Self {
            program,
            solution,
            var_points_to,
            call_graph,
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    /// Points-to set of `var` under `context`, `None` if the variable was
    /// never reached under that context.
    pub fn cs_points_to(&self, context: &Context, var: VarId) -> Option<&PointsToSet> {
        let manager = &self.solution.manager;
        let context = manager.lookup_context(context)?;
        let pointer = manager.lookup_pointer(&Pointer::Var { context, var })?;
        Some(manager.points_to(pointer))
    }

    pub fn points_to(&self, var: VarId) -> HashSet<ObjId> {
        self.var_points_to.get(&var).cloned().unwrap_or_default()
    }

    pub fn static_field_points_to(&self, field: FieldId) -> HashSet<ObjId> {
        self.project_cells(|p| p == Pointer::StaticField(field))
    }

    /// Union over all heap contexts of `obj`.
    pub fn instance_field_points_to(&self, obj: ObjId, field: FieldId) -> HashSet<ObjId> {
        self.project_cells(|p| match p {
            Pointer::InstanceField { base, field: f } => {
                f == field && self.solution.manager.cs_obj_value(base).obj == obj
            }
            _ => false,
        })
    }

    pub fn array_points_to(&self, obj: ObjId) -> HashSet<ObjId> {
        self.project_cells(|p| match p {
            Pointer::ArrayIndex(base) => self.solution.manager.cs_obj_value(base).obj == obj,
            _ => false,
        })
    }

    fn project_cells(&self, matches: impl Fn(Pointer) -> bool) -> HashSet<ObjId> {
        self.solution
            .manager
            .pointers()
            .filter(|&(_, p)| matches(p))
            .flat_map(|(id, _)| project(&self.solution, self.solution.manager.points_to(id)))
            .collect()
    }

    /// Whether `a` and `b` may point to the same abstract object.
    pub fn may_alias(&self, a: VarId, b: VarId) -> bool {
        match (self.var_points_to.get(&a), self.var_points_to.get(&b)) {
            (Some(a), Some(b)) => !a.is_disjoint(b),
            _ => false,
        }
    }

    pub fn obj(&self, id: ObjId) -> &Obj {
        self.solution.manager.obj(id)
    }

    pub fn cs_obj(&self, obj: CsObjId) -> CsObj {
        self.solution.manager.cs_obj_value(obj)
    }

    pub fn describe_obj(&self, id: ObjId) -> String {
        self.obj(id).describe(self.program)
    }

    /// All abstract objects created during the analysis.
    pub fn objects(&self) -> impl Iterator<Item = ObjId> {
        (0..self.solution.manager.num_objs()).map(ObjId::from_index)
    }

    pub fn cs_call_graph(&self) -> &CallGraph<CsCallSiteId, CsMethodId> {
        &self.solution.call_graph
    }

    pub fn call_graph(&self) -> &CallGraph<InvokeId, MethodId> {
        &self.call_graph
    }

    pub fn reachable_methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.call_graph.reachable_methods()
    }

    /// Concrete methods of the program the analysis never reached.
    pub fn unreachable_methods(&self) -> Vec<MethodId> {
        self.program
            .method_ids()
            .filter(|&m| !self.program.method(m).is_abstract)
            .filter(|&m| !self.call_graph.contains_method(m))
            .collect()
    }

    pub fn pointer_flow_edges(&self) -> impl Iterator<Item = (PointerId, PointerId)> + '_ {
        self.solution.pfg.edges()
    }

    pub fn describe_pointer(&self, id: PointerId) -> String {
        let manager = &self.solution.manager;
        match manager.pointer_value(id) {
            Pointer::Var { context, var } => format!(
                "{} {}",
                manager.context(context),
                self.program.var_signature(var)
            ),
            Pointer::InstanceField { base, field } => format!(
                "{}.{}",
                self.describe_cs_obj(base),
                self.program.field(field).name
            ),
            Pointer::StaticField(field) => self.program.field_signature(field),
            Pointer::ArrayIndex(base) => format!("{}[*]", self.describe_cs_obj(base)),
        }
    }

    pub fn describe_cs_method(&self, id: CsMethodId) -> String {
        let cs_method = self.solution.manager.cs_method_value(id);
        format!(
            "{} {}",
            self.solution.manager.context(cs_method.context),
            self.program.method_signature(cs_method.method)
        )
    }

    pub fn describe_cs_call_site(&self, id: CsCallSiteId) -> String {
        let cs_call_site = self.solution.manager.cs_call_site_value(id);
        format!(
            "{} {}",
            self.solution.manager.context(cs_call_site.context),
            self.program.invoke_signature(cs_call_site.invoke)
        )
    }

    fn describe_cs_obj(&self, id: CsObjId) -> String {
        let CsObj { context, obj } = self.cs_obj(id);
        format!(
            "{} {}",
            self.solution.manager.context(context),
            self.describe_obj(obj)
        )
    }

    pub fn stats(&self) -> &SolverStats {
        &self.solution.stats
    }
}

fn project(solution: &Solution, pts: &PointsToSet) -> Vec<ObjId> {
    pts.iter()
        .map(|o| solution.manager.cs_obj_value(o).obj)
        .collect()
}

fn project_call_graph(program: &Program, solution: &Solution) -> CallGraph<InvokeId, MethodId> {
    let manager = &solution.manager;
    let mut call_graph = CallGraph::new();
    for entry in solution.call_graph.entry_methods() {
        call_graph.add_entry_method(manager.cs_method_value(entry).method);
    }
    for method in solution.call_graph.reachable_methods() {
        call_graph.add_reachable_method(manager.cs_method_value(method).method);
    }
    for edge in solution.call_graph.edges() {
        let invoke = manager.cs_call_site_value(edge.call_site).invoke;
        let callee = manager.cs_method_value(edge.callee).method;
        call_graph.set_container(invoke, program.invoke(invoke).container);
        call_graph.add_edge(Edge::new(edge.kind, invoke, callee));
    }
    call_graph
}

/// Lists the non-empty context-insensitive points-to sets of all variables.
impl<'p> Display for PointerAnalysisResult<'p> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for var in self.var_points_to.keys().copied().sorted() {
            let pts = &self.var_points_to[&var];
            if pts.is_empty() {
                continue;
            }
            let objs = pts
                .iter()
                .copied()
                .sorted()
                .map(|o| self.describe_obj(o))
                .join(", ");
            writeln!(f, "{} -> {{{objs}}}", self.program.var_signature(var))?;
        }
        Ok(())
    }
}
