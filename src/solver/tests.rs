use hashbrown::{HashMap, HashSet};
use quickcheck_macros::quickcheck;

use super::context::{
    CallStringSelector, Context, ContextElem, ContextInsensitiveSelector, ContextSelector,
    ObjectSelector,
};
use super::heap::{AllocationSiteHeapModel, ObjKind, TypeHeapModel};
use super::manager::Pointer;
use super::pts::PointsToSet;
use super::worklist::WorkOrder;
use super::{Solution, Solver};
use crate::error::AnalysisError;
use crate::macros::set;
use crate::program::{
    AllocId, CallKind, ClassKind, InvokeId, MethodId, Program, ProgramBuilder, VarId,
};

/// Runs every test body once per work order. The fixpoint must not depend on
/// the order in which pending work is taken.
macro_rules! solver_tests {
    { $( fn $test_name:ident ( $order:ident ) $body:block )* } => {
        $(
            mod $test_name {
                use super::*;

                fn run($order: WorkOrder) $body

                #[test]
                fn fifo() {
                    run(WorkOrder::Fifo)
                }
                #[test]
                fn lifo() {
                    run(WorkOrder::Lifo)
                }
            }
        )*
    };
}

fn solve(program: &Program, selector: &dyn ContextSelector, order: WorkOrder) -> Solution {
    Solver::new(program, selector, &AllocationSiteHeapModel)
        .with_work_order(order)
        .solve()
        .expect("analysis should reach a fixpoint")
}

fn allocs_of(solution: &Solution, pts: &PointsToSet) -> HashSet<AllocId> {
    pts.iter()
        .map(|o| {
            let obj = solution.manager.obj(solution.manager.cs_obj_value(o).obj);
            match obj.kind {
                ObjKind::Alloc(site) => site,
                ObjKind::Merged(_) => panic!("unexpected merged object {obj:?}"),
            }
        })
        .collect()
}

fn cs_points_to(solution: &Solution, context: &Context, var: VarId) -> HashSet<AllocId> {
    let pointer = solution
        .manager
        .lookup_context(context)
        .and_then(|context| solution.manager.lookup_pointer(&Pointer::Var { context, var }));
    match pointer {
        Some(p) => allocs_of(solution, solution.manager.points_to(p)),
        None => HashSet::new(),
    }
}

fn points_to(solution: &Solution, var: VarId) -> HashSet<AllocId> {
    solution
        .manager
        .pointers()
        .filter(|(_, p)| matches!(p, Pointer::Var { var: v, .. } if *v == var))
        .flat_map(|(id, _)| allocs_of(solution, solution.manager.points_to(id)))
        .collect()
}

fn callees(solution: &Solution, invoke: InvokeId) -> HashSet<MethodId> {
    solution
        .call_graph
        .edges()
        .filter(|e| solution.manager.cs_call_site_value(e.call_site).invoke == invoke)
        .map(|e| solution.manager.cs_method_value(e.callee).method)
        .collect()
}

fn reachable(solution: &Solution) -> HashSet<MethodId> {
    solution
        .call_graph
        .reachable_methods()
        .map(|m| solution.manager.cs_method_value(m).method)
        .collect()
}

struct Dispatch {
    program: Program,
    a_m: MethodId,
    b_m: MethodId,
    call: InvokeId,
    x: VarId,
    r: VarId,
    new_b: AllocId,
}

/// `B extends A`, both declare `m()` returning `this`; `main` calls `m` on
/// a `B` through a variable of type `A`.
fn dispatch_program() -> Dispatch {
    let mut builder = ProgramBuilder::new();
    let a = builder.add_class("A", ClassKind::Class, None).unwrap();
    let b = builder.add_class("B", ClassKind::Class, Some(a)).unwrap();
    let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();

    let a_m = builder.add_method(a, "m()", false, false, &[]).unwrap();
    let this = builder.var(a_m, "this");
    builder.push_return(a_m, Some(this));
    let b_m = builder.add_method(b, "m()", false, false, &[]).unwrap();
    let this = builder.var(b_m, "this");
    builder.push_return(b_m, Some(this));

    let main = builder
        .add_method(main_class, "main()", true, false, &[])
        .unwrap();
    let x = builder.var(main, "x");
    let r = builder.var(main, "r");
    let new_b = builder.push_new(main, x, b);
    let call = builder.push_invoke(main, CallKind::Virtual, a, "m()", Some(x), &[], Some(r));
    builder.set_entry(main);

    Dispatch {
        program: builder.build().unwrap(),
        a_m,
        b_m,
        call,
        x,
        r,
        new_b,
    }
}

solver_tests! {
    fn static_call_makes_callee_reachable(order) {
        let mut builder = ProgramBuilder::new();
        let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();
        let main = builder.add_method(main_class, "main()", true, false, &[]).unwrap();
        let foo = builder.add_method(main_class, "foo()", true, false, &[]).unwrap();
        let bar = builder.add_method(main_class, "bar()", true, false, &[]).unwrap();
        let call = builder.push_invoke(main, CallKind::Static, main_class, "foo()", None, &[], None);
        builder.set_entry(main);
        let program = builder.build().unwrap();

        let solution = solve(&program, &ContextInsensitiveSelector, order);
        assert_eq!(reachable(&solution), set![main, foo]);
        assert!(!reachable(&solution).contains(&bar));

        let edges: Vec<_> = solution.call_graph.edges().collect();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, CallKind::Static);
        assert_eq!(callees(&solution, call), set![foo]);
        let entry = solution.call_graph.entry_methods().next().unwrap();
        assert_eq!(solution.manager.cs_method_value(entry).method, main);
    }

    fn virtual_call_dispatches_on_the_receiver_object(order) {
        let d = dispatch_program();
        let solution = solve(&d.program, &ContextInsensitiveSelector, order);

        assert_eq!(callees(&solution, d.call), set![d.b_m]);
        assert!(!reachable(&solution).contains(&d.a_m));
        assert_eq!(points_to(&solution, d.x), set![d.new_b]);
        assert_eq!(points_to(&solution, d.r), set![d.new_b]);
        let edge = solution.call_graph.edges().next().unwrap();
        assert_eq!(edge.kind, CallKind::Virtual);
    }

    fn loads_see_stores_through_the_same_object(order) {
        let mut builder = ProgramBuilder::new();
        let a = builder.add_class("A", ClassKind::Class, None).unwrap();
        let f = builder.add_field(a, "f", false).unwrap();
        let g = builder.add_field(a, "g", false).unwrap();
        let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();
        let main = builder.add_method(main_class, "main()", true, false, &[]).unwrap();
        let [x, w, y, z, u] = ["x", "w", "y", "z", "u"].map(|n| builder.var(main, n));
        builder.push_new(main, x, a);
        builder.push_new(main, w, a);
        let new_y = builder.push_new(main, y, a);
        // z is loaded before anything is stored: the store still reaches it.
        builder.push_load_field(main, z, x, f);
        builder.push_store_field(main, x, f, y);
        builder.push_load_field(main, u, w, f);
        builder.push_load_field(main, u, x, g);
        builder.set_entry(main);
        let program = builder.build().unwrap();

        let solution = solve(&program, &ContextInsensitiveSelector, order);
        assert_eq!(points_to(&solution, z), set![new_y]);
        assert!(points_to(&solution, u).is_empty());
    }

    fn array_elements_share_one_cell(order) {
        let mut builder = ProgramBuilder::new();
        let a = builder.add_class("A", ClassKind::Class, None).unwrap();
        let array = builder.add_class("A[]", ClassKind::Class, None).unwrap();
        let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();
        let main = builder.add_method(main_class, "main()", true, false, &[]).unwrap();
        let [arr, other, o1, o2, x, y] =
            ["arr", "other", "o1", "o2", "x", "y"].map(|n| builder.var(main, n));
        builder.push_new(main, arr, array);
        builder.push_new(main, other, array);
        let new_o1 = builder.push_new(main, o1, a);
        let new_o2 = builder.push_new(main, o2, a);
        builder.push_store_array(main, arr, o1);
        builder.push_store_array(main, arr, o2);
        builder.push_load_array(main, x, arr);
        builder.push_load_array(main, y, other);
        builder.set_entry(main);
        let program = builder.build().unwrap();

        let solution = solve(&program, &ContextInsensitiveSelector, order);
        assert_eq!(points_to(&solution, x), set![new_o1, new_o2]);
        assert!(points_to(&solution, y).is_empty());
    }

    fn static_fields_connect_methods(order) {
        let mut builder = ProgramBuilder::new();
        let a = builder.add_class("A", ClassKind::Class, None).unwrap();
        let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();
        let sf = builder.add_field(main_class, "sf", true).unwrap();
        let main = builder.add_method(main_class, "main()", true, false, &[]).unwrap();
        let get = builder.add_method(main_class, "get()", true, false, &[]).unwrap();
        let [o, r] = ["o", "r"].map(|n| builder.var(main, n));
        let new_o = builder.push_new(main, o, a);
        builder.push_store_static(main, sf, o);
        builder.push_invoke(main, CallKind::Static, main_class, "get()", None, &[], Some(r));
        let v = builder.var(get, "v");
        builder.push_load_static(get, v, sf);
        builder.push_return(get, Some(v));
        builder.set_entry(main);
        let program = builder.build().unwrap();

        let solution = solve(&program, &ContextInsensitiveSelector, order);
        assert_eq!(points_to(&solution, r), set![new_o]);
        let field = solution.manager.lookup_pointer(&Pointer::StaticField(sf)).unwrap();
        assert_eq!(allocs_of(&solution, solution.manager.points_to(field)), set![new_o]);
    }

    fn call_site_contexts_keep_arguments_apart(order) {
        let mut builder = ProgramBuilder::new();
        let a = builder.add_class("A", ClassKind::Class, None).unwrap();
        let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();
        let main = builder.add_method(main_class, "main()", true, false, &[]).unwrap();
        let id = builder.add_method(main_class, "id(A)", true, false, &["p"]).unwrap();
        let p = builder.var(id, "p");
        builder.push_return(id, Some(p));
        let [x, y, r1, r2] = ["x", "y", "r1", "r2"].map(|n| builder.var(main, n));
        let new_x = builder.push_new(main, x, a);
        let new_y = builder.push_new(main, y, a);
        let c1 = builder.push_invoke(main, CallKind::Static, main_class, "id(A)", None, &[x], Some(r1));
        let c2 = builder.push_invoke(main, CallKind::Static, main_class, "id(A)", None, &[y], Some(r2));
        builder.set_entry(main);
        let program = builder.build().unwrap();

        let solution = solve(&program, &CallStringSelector::new(1), order);
        let ctx1 = Context::from_elems(&[ContextElem::CallSite(c1)]);
        let ctx2 = Context::from_elems(&[ContextElem::CallSite(c2)]);
        assert_eq!(cs_points_to(&solution, &ctx1, p), set![new_x]);
        assert_eq!(cs_points_to(&solution, &ctx2, p), set![new_y]);
        assert_eq!(points_to(&solution, r1), set![new_x]);
        assert_eq!(points_to(&solution, r2), set![new_y]);
        assert_eq!(solution.call_graph.num_reachable_methods(), 3);

        let solution = solve(&program, &ContextInsensitiveSelector, order);
        assert_eq!(points_to(&solution, r1), set![new_x, new_y]);
        assert_eq!(solution.call_graph.num_reachable_methods(), 2);
    }

    fn call_site_contexts_keep_receivers_apart(order) {
        let mut builder = ProgramBuilder::new();
        let a = builder.add_class("A", ClassKind::Class, None).unwrap();
        let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();
        let m = builder.add_method(a, "m()", false, false, &[]).unwrap();
        let this = builder.var(m, "this");
        builder.push_return(m, Some(this));
        let main = builder.add_method(main_class, "main()", true, false, &[]).unwrap();
        let [x, y, r1, r2] = ["x", "y", "r1", "r2"].map(|n| builder.var(main, n));
        let new_x = builder.push_new(main, x, a);
        let new_y = builder.push_new(main, y, a);
        let c1 = builder.push_invoke(main, CallKind::Virtual, a, "m()", Some(x), &[], Some(r1));
        let c2 = builder.push_invoke(main, CallKind::Virtual, a, "m()", Some(y), &[], Some(r2));
        builder.set_entry(main);
        let program = builder.build().unwrap();

        let solution = solve(&program, &CallStringSelector::new(1), order);
        let ctx1 = Context::from_elems(&[ContextElem::CallSite(c1)]);
        let ctx2 = Context::from_elems(&[ContextElem::CallSite(c2)]);
        assert_eq!(cs_points_to(&solution, &ctx1, this), set![new_x]);
        assert_eq!(cs_points_to(&solution, &ctx2, this), set![new_y]);
        assert!(cs_points_to(&solution, &Context::empty(), this).is_empty());
        assert_eq!(points_to(&solution, r1), set![new_x]);
        assert_eq!(points_to(&solution, r2), set![new_y]);

        let solution = solve(&program, &ContextInsensitiveSelector, order);
        assert_eq!(cs_points_to(&solution, &Context::empty(), this), set![new_x, new_y]);
    }

    fn receiver_objects_keep_parameters_apart(order) {
        let mut builder = ProgramBuilder::new();
        let a = builder.add_class("A", ClassKind::Class, None).unwrap();
        let b = builder.add_class("B", ClassKind::Class, None).unwrap();
        let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();
        let id = builder.add_method(a, "id(B)", false, false, &["p"]).unwrap();
        let p = builder.var(id, "p");
        builder.push_return(id, Some(p));
        let main = builder.add_method(main_class, "main()", true, false, &[]).unwrap();
        let [a1, a2, b1, b2, r1, r2] =
            ["a1", "a2", "b1", "b2", "r1", "r2"].map(|n| builder.var(main, n));
        builder.push_new(main, a1, a);
        builder.push_new(main, a2, a);
        let new_b1 = builder.push_new(main, b1, b);
        let new_b2 = builder.push_new(main, b2, b);
        builder.push_invoke(main, CallKind::Virtual, a, "id(B)", Some(a1), &[b1], Some(r1));
        builder.push_invoke(main, CallKind::Virtual, a, "id(B)", Some(a2), &[b2], Some(r2));
        builder.set_entry(main);
        let program = builder.build().unwrap();

        let solution = solve(&program, &ObjectSelector::new(1), order);
        assert_eq!(points_to(&solution, r1), set![new_b1]);
        assert_eq!(points_to(&solution, r2), set![new_b2]);

        let solution = solve(&program, &ContextInsensitiveSelector, order);
        assert_eq!(points_to(&solution, r1), set![new_b1, new_b2]);
    }

    fn unresolvable_calls_are_skipped(order) {
        let mut builder = ProgramBuilder::new();
        let i = builder.add_class("I", ClassKind::Interface, None).unwrap();
        let c = builder.add_class("C", ClassKind::Class, None).unwrap();
        builder.add_interface(c, i);
        let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();
        builder.add_method(i, "m()", false, true, &[]).unwrap();
        let main = builder.add_method(main_class, "main()", true, false, &[]).unwrap();
        let [x, r] = ["x", "r"].map(|n| builder.var(main, n));
        builder.push_new(main, x, c);
        let call = builder.push_invoke(main, CallKind::Interface, i, "m()", Some(x), &[], Some(r));
        let dynamic =
            builder.push_invoke(main, CallKind::Dynamic, i, "m()", Some(x), &[], Some(r));
        builder.set_entry(main);
        let program = builder.build().unwrap();

        let solution = solve(&program, &ContextInsensitiveSelector, order);
        assert!(callees(&solution, call).is_empty());
        assert!(callees(&solution, dynamic).is_empty());
        assert_eq!(reachable(&solution), set![main]);
        assert!(points_to(&solution, r).is_empty());
    }

    fn recursion_terminates_under_call_strings(order) {
        let mut builder = ProgramBuilder::new();
        let a = builder.add_class("A", ClassKind::Class, None).unwrap();
        let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();
        let main = builder.add_method(main_class, "main()", true, false, &[]).unwrap();
        let rec = builder.add_method(main_class, "rec(A)", true, false, &["p"]).unwrap();
        let p = builder.var(rec, "p");
        let q = builder.var(rec, "q");
        let new_q = builder.push_new(rec, q, a);
        builder.push_invoke(rec, CallKind::Static, main_class, "rec(A)", None, &[q], None);
        let x = builder.var(main, "x");
        let new_x = builder.push_new(main, x, a);
        builder.push_invoke(main, CallKind::Static, main_class, "rec(A)", None, &[x], None);
        builder.set_entry(main);
        let program = builder.build().unwrap();

        let solution = solve(&program, &CallStringSelector::new(2), order);
        assert_eq!(points_to(&solution, p), set![new_x, new_q]);
    }
}

#[test]
fn type_heap_model_merges_allocation_sites() {
    let mut builder = ProgramBuilder::new();
    let a = builder.add_class("A", ClassKind::Class, None).unwrap();
    let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();
    let main = builder.add_method(main_class, "main()", true, false, &[]).unwrap();
    let [x, y] = ["x", "y"].map(|n| builder.var(main, n));
    builder.push_new(main, x, a);
    builder.push_new(main, y, a);
    builder.set_entry(main);
    let program = builder.build().unwrap();

    let solution = Solver::new(&program, &ContextInsensitiveSelector, &TypeHeapModel)
        .solve()
        .unwrap();
    assert_eq!(solution.manager.num_objs(), 1);
    let ctx = solution.manager.lookup_context(&Context::empty()).unwrap();
    let px = solution.manager.lookup_pointer(&Pointer::Var { context: ctx, var: x }).unwrap();
    let py = solution.manager.lookup_pointer(&Pointer::Var { context: ctx, var: y }).unwrap();
    assert_eq!(solution.manager.points_to(px), solution.manager.points_to(py));
}

#[test]
fn late_edges_receive_existing_objects() {
    let d = dispatch_program();
    let mut solver = Solver::new(&d.program, &ContextInsensitiveSelector, &AllocationSiteHeapModel);
    solver.initialize();
    solver.analyze().unwrap();

    let ctx = solver.manager.context_id(Context::empty());
    let source = solver.manager.cs_var(ctx, d.x);
    let unused = d.program.method(d.a_m).this.unwrap();
    let target = solver.manager.cs_var(ctx, unused);
    assert!(!solver.manager.points_to(source).is_empty());
    assert!(solver.manager.points_to(target).is_empty());

    assert!(solver.add_pfg_edge(source, target));
    assert!(!solver.add_pfg_edge(source, target));
    solver.analyze().unwrap();
    assert_eq!(
        solver.manager.points_to(target),
        solver.manager.points_to(source)
    );
}

#[test]
fn add_reachable_is_idempotent() {
    let d = dispatch_program();
    let mut solver = Solver::new(&d.program, &ContextInsensitiveSelector, &AllocationSiteHeapModel);
    solver.initialize();
    let pending = solver.worklist.len();
    let pointers = solver.manager.num_pointers();

    let entry = solver.call_graph.entry_methods().next().unwrap();
    solver.add_reachable(entry);
    assert_eq!(solver.worklist.len(), pending);
    assert_eq!(solver.manager.num_pointers(), pointers);
    assert_eq!(solver.call_graph.num_reachable_methods(), 1);
}

#[test]
fn iteration_limit_aborts_the_analysis() {
    let d = dispatch_program();
    let result = Solver::new(&d.program, &ContextInsensitiveSelector, &AllocationSiteHeapModel)
        .with_max_iterations(Some(1))
        .solve();
    assert!(matches!(result, Err(AnalysisError::IterationLimitExceeded(1))));

    let result = Solver::new(&d.program, &ContextInsensitiveSelector, &AllocationSiteHeapModel)
        .with_max_iterations(Some(1000))
        .solve();
    assert!(result.is_ok());
}

/// Builds `main` from a list of encoded statements over four local
/// variables. Every class has a field `f` and a static identity method is
/// available, so all kinds of flow appear in generated programs.
fn random_program(ops: &[(u8, u8, u8)]) -> (Program, Vec<VarId>) {
    let mut builder = ProgramBuilder::new();
    let a = builder.add_class("A", ClassKind::Class, None).unwrap();
    let f = builder.add_field(a, "f", false).unwrap();
    let main_class = builder.add_class("Main", ClassKind::Class, None).unwrap();
    let main = builder.add_method(main_class, "main()", true, false, &[]).unwrap();
    let id = builder.add_method(main_class, "id(A)", true, false, &["p"]).unwrap();
    let p = builder.var(id, "p");
    builder.push_return(id, Some(p));

    let vars: Vec<VarId> = (0..4).map(|i| builder.var(main, &format!("v{i}"))).collect();
    for &(op, l, r) in ops {
        let lhs = vars[l as usize % vars.len()];
        let rhs = vars[r as usize % vars.len()];
        match op % 7 {
            0 => {
                builder.push_new(main, lhs, a);
            }
            1 => builder.push_copy(main, lhs, rhs),
            2 => builder.push_store_field(main, lhs, f, rhs),
            3 => builder.push_load_field(main, lhs, rhs, f),
            4 => builder.push_store_array(main, lhs, rhs),
            5 => builder.push_load_array(main, lhs, rhs),
            _ => {
                builder.push_invoke(main, CallKind::Static, main_class, "id(A)", None, &[rhs], Some(lhs));
            }
        }
    }
    builder.set_entry(main);
    (builder.build().unwrap(), vars)
}

fn solve_vars(
    program: &Program,
    vars: &[VarId],
    order: WorkOrder,
) -> HashMap<VarId, HashSet<AllocId>> {
    let solution = solve(program, &CallStringSelector::new(1), order);
    vars.iter()
        .map(|&v| (v, points_to(&solution, v)))
        .collect()
}

#[quickcheck]
fn work_order_does_not_change_the_fixpoint(ops: Vec<(u8, u8, u8)>) -> bool {
    let (program, vars) = random_program(&ops);
    solve_vars(&program, &vars, WorkOrder::Fifo) == solve_vars(&program, &vars, WorkOrder::Lifo)
}

#[quickcheck]
fn more_statements_never_shrink_points_to_sets(ops: Vec<(u8, u8, u8)>) -> bool {
    let half = ops.len() / 2;
    let (prefix, vars) = random_program(&ops[..half]);
    let (full, _) = random_program(&ops);
    let before = solve_vars(&prefix, &vars, WorkOrder::Fifo);
    let after = solve_vars(&full, &vars, WorkOrder::Fifo);
    vars.iter().all(|v| before[v].is_subset(&after[v]))
}
