use super::*;
use crate::error::ProgramError;
use crate::macros::set;

const SHAPES: &str = r#"{
    "entry": "Main.main()",
    "classes": [
        { "name": "Shape", "abstract": true, "fields": [{ "name": "next" }],
          "methods": [
            { "signature": "area()", "abstract": true },
            { "signature": "self()", "body": [{ "return": { "var": "this" } }] }
          ] },
        { "name": "Circle", "superclass": "Shape",
          "methods": [{ "signature": "area()", "body": [{ "return": {} }] }] },
        { "name": "Square", "superclass": "Shape", "interfaces": ["Named"] },
        { "name": "Named", "kind": "interface",
          "methods": [{ "signature": "name()", "abstract": true }] },
        { "name": "Main", "fields": [{ "name": "last", "static": true }],
          "methods": [{ "signature": "main()", "static": true, "body": [
            { "new": { "lhs": "c", "class": "Circle" } },
            { "store_field": { "base": "c", "field": "Circle.next", "rhs": "c" } },
            { "invoke": { "kind": "virtual", "method": "Shape.area()", "receiver": "c" } },
            { "store_static": { "field": "Main.last", "rhs": "c" } },
            { "load_array": { "lhs": "e", "base": "c" } }
          ] }] }
    ]
}"#;

fn with_main(body: &str) -> String {
    format!(
        r#"{{
            "entry": "Main.main()",
            "classes": [
                {{ "name": "A", "fields": [{{ "name": "f" }}],
                   "methods": [{{ "signature": "m(A)", "params": ["p"] }}] }},
                {{ "name": "Main", "methods": [
                    {{ "signature": "main()", "static": true, "body": [{body}] }},
                    {{ "signature": "id(A)", "static": true, "params": ["p"] }}
                ] }}
            ]
        }}"#
    )
}

#[test]
fn json_program_is_indexed() {
    let program = Program::from_json(SHAPES).unwrap();
    let main = program.entry_method();
    assert_eq!(program.method_signature(main), "Main.main()");
    assert_eq!(program.method(main).stmts.len(), 5);

    let c = program.lookup_var("Main.main()", "c").unwrap();
    assert_eq!(program.var_signature(c), "c@Main.main()");
    let uses = program.var(c).uses();
    assert_eq!(uses.store_fields.len(), 1);
    assert_eq!(uses.invokes.len(), 1);
    assert_eq!(uses.load_arrays.len(), 1);

    // `Circle.next` is declared in Shape.
    let next = program.lookup_field("Circle.next").unwrap();
    assert_eq!(program.field_signature(next), "Shape.next");
    assert!(program.field(program.lookup_field("Main.last").unwrap()).is_static);

    let invoke = program.invoke(uses.invokes[0]);
    assert_eq!(invoke.kind, CallKind::Virtual);
    assert_eq!(program.invoke_signature(uses.invokes[0]), "Main.main()#2");
    assert_eq!(program.alloc_signature(AllocId(0)), "new Circle@Main.main()#0");

    let named = program.class_by_name("Named").unwrap();
    assert!(program.class(named).is_interface());
    assert!(program.class(named).is_abstract);
}

#[test]
fn dispatch_skips_abstract_declarations() {
    let program = Program::from_json(SHAPES).unwrap();
    let circle = program.class_by_name("Circle").unwrap();
    let square = program.class_by_name("Square").unwrap();
    let area = Subsignature::new("area()");

    assert_eq!(
        program.dispatch(circle, &area),
        program.lookup_method("Circle", "area()")
    );
    assert_eq!(program.dispatch(square, &area), None);
    assert_eq!(
        program.dispatch(square, &Subsignature::new("self()")),
        program.lookup_method("Shape", "self()")
    );
    assert_eq!(program.dispatch(square, &Subsignature::new("missing()")), None);
}

#[test]
fn subtypes_include_implementors() {
    let program = Program::from_json(SHAPES).unwrap();
    let id = |name| program.class_by_name(name).unwrap();

    let shapes: hashbrown::HashSet<_> = program.subtypes_of(id("Shape")).into_iter().collect();
    assert_eq!(shapes, set![id("Shape"), id("Circle"), id("Square")]);
    assert_eq!(program.subtypes_of(id("Named")), vec![id("Named"), id("Square")]);
    assert_eq!(program.class(id("Named")).direct_implementors(), &[id("Square")]);
}

#[test]
fn member_refs_split_before_the_parameter_list() {
    assert_eq!(split_member_ref("a.b.C.f"), Some(("a.b.C", "f")));
    assert_eq!(split_member_ref("a.C.m(a.D,a.E)"), Some(("a.C", "m(a.D,a.E)")));
    assert_eq!(split_member_ref("f"), None);
    assert_eq!(split_member_ref(".f"), None);
    assert_eq!(Subsignature::new("m(a.D)").name(), "m");
}

#[test]
fn builder_creates_this_for_instance_methods() {
    let mut builder = ProgramBuilder::new();
    let a = builder.add_class("A", ClassKind::Class, None).unwrap();
    let m = builder.add_method(a, "m(A,A)", false, false, &["x", "y"]).unwrap();
    let s = builder.add_method(a, "s()", true, false, &[]).unwrap();
    assert_eq!(builder.var(m, "x"), builder.var(m, "x"));
    builder.set_entry(s);
    let program = builder.build().unwrap();

    let m = program.method(m);
    assert!(m.this.is_some());
    assert_eq!(m.params.len(), 2);
    assert_eq!(m.name(), "m");
    assert!(program.method(s).this.is_none());
}

#[test]
fn duplicate_declarations_are_rejected() {
    let mut builder = ProgramBuilder::new();
    let a = builder.add_class("A", ClassKind::Class, None).unwrap();
    assert!(matches!(
        builder.add_class("A", ClassKind::Interface, None),
        Err(ProgramError::DuplicateClass(name)) if name == "A"
    ));
    builder.add_field(a, "f", false).unwrap();
    assert!(matches!(
        builder.add_field(a, "f", true),
        Err(ProgramError::DuplicateField(name)) if name == "A.f"
    ));
    builder.add_method(a, "m()", false, false, &[]).unwrap();
    assert!(matches!(
        builder.add_method(a, "m()", true, false, &[]),
        Err(ProgramError::DuplicateMethod(name)) if name == "A.m()"
    ));
}

#[test]
fn unknown_names_are_rejected() {
    let err = Program::from_json(&with_main(r#"{ "new": { "lhs": "x", "class": "B" } }"#));
    assert!(matches!(err, Err(ProgramError::UnknownClass(name)) if name == "B"));

    let err = Program::from_json(&with_main(
        r#"{ "load_field": { "lhs": "x", "base": "y", "field": "A.g" } }"#,
    ));
    assert!(matches!(err, Err(ProgramError::UnknownField(name)) if name == "A.g"));

    let err = Program::from_json(&with_main(
        r#"{ "load_field": { "lhs": "x", "base": "y", "field": "g" } }"#,
    ));
    assert!(matches!(err, Err(ProgramError::MalformedReference(_))));

    let err = Program::from_json(r#"{ "entry": "Main.main()", "classes": [{ "name": "Main" }] }"#);
    assert!(matches!(err, Err(ProgramError::UnknownMethod(_))));

    assert!(matches!(Program::from_json("{"), Err(ProgramError::Json(_))));
}

#[test]
fn calls_are_validated() {
    let err = Program::from_json(&with_main(
        r#"{ "invoke": { "kind": "static", "method": "Main.id(A)", "receiver": "x", "args": ["x"] } }"#,
    ));
    assert!(matches!(err, Err(ProgramError::UnexpectedReceiver(_))));

    let err = Program::from_json(&with_main(
        r#"{ "invoke": { "kind": "virtual", "method": "A.m(A)", "args": ["x"] } }"#,
    ));
    assert!(matches!(err, Err(ProgramError::MissingReceiver(_))));

    let err = Program::from_json(&with_main(
        r#"{ "invoke": { "kind": "static", "method": "Main.other()" } }"#,
    ));
    assert!(matches!(err, Err(ProgramError::UnresolvedCall(_))));

    let err = Program::from_json(&with_main(
        r#"{ "invoke": { "kind": "virtual", "method": "A.m(A)", "receiver": "x" } }"#,
    ));
    assert!(matches!(
        err,
        Err(ProgramError::ArityMismatch { expected: 1, found: 0, .. })
    ));

    // `B` inherits `m(A)` from `A`, so dispatch on a `B` still needs an
    // argument.
    let err = Program::from_json(
        r#"{
            "entry": "Main.main()",
            "classes": [
                { "name": "A", "methods": [{ "signature": "m(A)", "params": ["p"] }] },
                { "name": "B", "superclass": "A" },
                { "name": "Main", "methods": [{ "signature": "main()", "static": true, "body": [
                    { "new": { "lhs": "x", "class": "B" } },
                    { "invoke": { "kind": "virtual", "method": "B.m(A)", "receiver": "x" } }
                ] }] }
            ]
        }"#,
    );
    assert!(matches!(
        err,
        Err(ProgramError::ArityMismatch { ref callee, expected: 1, found: 0, .. }) if callee == "A.m(A)"
    ));

    assert!(Program::from_json(&with_main(
        r#"{ "invoke": { "kind": "static", "method": "Main.id(A)", "args": ["x"], "result": "r" } }"#,
    ))
    .is_ok());
}

#[test]
fn field_kinds_must_match_accesses() {
    let err = Program::from_json(&with_main(
        r#"{ "load_static": { "lhs": "x", "field": "A.f" } }"#,
    ));
    assert!(matches!(err, Err(ProgramError::FieldKindMismatch(name)) if name == "A.f"));
}

#[test]
fn entry_must_be_static() {
    let mut builder = ProgramBuilder::new();
    let a = builder.add_class("A", ClassKind::Class, None).unwrap();
    let m = builder.add_method(a, "m()", false, false, &[]).unwrap();
    assert!(matches!(
        ProgramBuilder::new().build(),
        Err(ProgramError::MissingEntry)
    ));
    builder.set_entry(m);
    assert!(matches!(builder.build(), Err(ProgramError::InvalidEntry(_))));
}

#[test]
fn cyclic_hierarchies_are_rejected() {
    let mut builder = ProgramBuilder::new();
    let a = builder.add_class("A", ClassKind::Class, None).unwrap();
    let b = builder.add_class("B", ClassKind::Class, Some(a)).unwrap();
    builder.set_superclass(a, Some(b));
    let main = builder.add_method(a, "main()", true, false, &[]).unwrap();
    builder.set_entry(main);
    assert!(matches!(builder.build(), Err(ProgramError::HierarchyCycle(_))));
}
