//! Flat model of the analyzed program: classes, fields, methods with their
//! statement lists, and the allocation sites and call sites they contain.
//!
//! Everything lives in arenas owned by [`Program`] and is referred to by
//! typed indices. A program is created through [`ProgramBuilder`] or loaded
//! from a JSON description, both of which validate the model before handing
//! it out.

use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

use hashbrown::HashMap;
use serde::Deserialize;

use crate::index_type;

mod builder;
mod hierarchy;
mod json;
#[cfg(test)]
mod tests;

pub use builder::ProgramBuilder;
pub use json::{ClassDesc, FieldDesc, MethodDesc, ProgramDesc, StmtDesc};

index_type!(pub struct ClassId;);
index_type!(pub struct MethodId;);
index_type!(pub struct VarId;);
index_type!(pub struct FieldId;);
index_type!(
    /// An allocation site, i.e. a `x = new T` statement.
    pub struct AllocId;
);
index_type!(
    /// A call site, i.e. an invocation statement.
    pub struct InvokeId;
);

/// Key of a method inside its class. Methods with the same subsignature in a
/// subclass override the ones of its superclasses.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Subsignature(Rc<str>);

impl Subsignature {
    pub fn new(s: &str) -> Self {
        Self(Rc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The method name, i.e. everything before the parameter list.
    pub fn name(&self) -> &str {
        match self.0.find('(') {
            Some(i) => &self.0[..i],
            None => &self.0,
        }
    }
}

impl Display for Subsignature {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
}

#[derive(Debug)]
pub struct Class {
    pub name: Rc<str>,
    pub kind: ClassKind,
    pub is_abstract: bool,
    pub superclass: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    methods: HashMap<Subsignature, MethodId>,
    fields: HashMap<Rc<str>, FieldId>,
    subclasses: Vec<ClassId>,
    implementors: Vec<ClassId>,
    subinterfaces: Vec<ClassId>,
}

impl Class {
    fn new(name: &str, kind: ClassKind) -> Self {
        Self {
            name: Rc::from(name),
            kind,
            is_abstract: kind == ClassKind::Interface,
            superclass: None,
            interfaces: vec![],
            methods: HashMap::new(),
            fields: HashMap::new(),
            subclasses: vec![],
            implementors: vec![],
            subinterfaces: vec![],
        }
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    pub fn declared_method(&self, subsignature: &Subsignature) -> Option<MethodId> {
        self.methods.get(subsignature).copied()
    }

    pub fn declared_methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.methods.values().copied()
    }

    pub fn declared_field(&self, name: &str) -> Option<FieldId> {
        self.fields.get(name).copied()
    }

    pub fn direct_subclasses(&self) -> &[ClassId] {
        &self.subclasses
    }

    pub fn direct_implementors(&self) -> &[ClassId] {
        &self.implementors
    }

    pub fn direct_subinterfaces(&self) -> &[ClassId] {
        &self.subinterfaces
    }
}

#[derive(Debug)]
pub struct Field {
    pub name: Rc<str>,
    pub class: ClassId,
    pub is_static: bool,
}

#[derive(Debug)]
pub struct Method {
    pub subsignature: Subsignature,
    pub class: ClassId,
    pub is_static: bool,
    pub is_abstract: bool,
    /// Implicit receiver parameter, present exactly for instance methods.
    pub this: Option<VarId>,
    pub params: Vec<VarId>,
    pub return_vars: Vec<VarId>,
    pub stmts: Vec<Stmt>,
    var_names: HashMap<Rc<str>, VarId>,
}

impl Method {
    pub fn name(&self) -> &str {
        self.subsignature.name()
    }

    pub fn var_by_name(&self, name: &str) -> Option<VarId> {
        self.var_names.get(name).copied()
    }
}

/// Statements of a variable's method that use the variable as base or
/// receiver. These are the statements that have to be revisited whenever
/// the variable may point to a new object.
#[derive(Debug, Default)]
pub struct VarUses {
    /// `var.field = rhs`
    pub store_fields: Vec<(FieldId, VarId)>,
    /// `lhs = var.field`
    pub load_fields: Vec<(VarId, FieldId)>,
    /// `var[*] = rhs`
    pub store_arrays: Vec<VarId>,
    /// `lhs = var[*]`
    pub load_arrays: Vec<VarId>,
    /// `var.m(..)`
    pub invokes: Vec<InvokeId>,
}

#[derive(Debug)]
pub struct Var {
    pub name: Rc<str>,
    pub method: MethodId,
    uses: VarUses,
}

impl Var {
    pub fn uses(&self) -> &VarUses {
        &self.uses
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stmt {
    /// `x = new T`
    New(AllocId),
    /// `x = y`
    Copy { lhs: VarId, rhs: VarId },
    /// `x = y.f`
    LoadField {
        lhs: VarId,
        base: VarId,
        field: FieldId,
    },
    /// `x.f = y`
    StoreField {
        base: VarId,
        field: FieldId,
        rhs: VarId,
    },
    /// `x = T.f`
    LoadStatic { lhs: VarId, field: FieldId },
    /// `T.f = y`
    StoreStatic { field: FieldId, rhs: VarId },
    /// `x = y[*]`
    LoadArray { lhs: VarId, base: VarId },
    /// `x[*] = y`
    StoreArray { base: VarId, rhs: VarId },
    Invoke(InvokeId),
    Return(Option<VarId>),
}

#[derive(Debug)]
pub struct Allocation {
    pub lhs: VarId,
    /// Type of the created objects. Array allocations use a class standing
    /// for the array type.
    pub class: ClassId,
    pub container: MethodId,
    pub stmt_index: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    Static,
    /// Constructor, private and super calls.
    Special,
    Virtual,
    Interface,
    Dynamic,
}

impl Display for CallKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            CallKind::Static => write!(f, "static"),
            CallKind::Special => write!(f, "special"),
            CallKind::Virtual => write!(f, "virtual"),
            CallKind::Interface => write!(f, "interface"),
            CallKind::Dynamic => write!(f, "dynamic"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class: ClassId,
    pub subsignature: Subsignature,
}

#[derive(Debug)]
pub struct Invoke {
    pub kind: CallKind,
    pub method_ref: MethodRef,
    pub receiver: Option<VarId>,
    pub args: Vec<VarId>,
    pub result: Option<VarId>,
    pub container: MethodId,
    pub stmt_index: usize,
}

impl Invoke {
    pub fn is_static(&self) -> bool {
        self.kind == CallKind::Static
    }
}

#[derive(Debug)]
pub struct Program {
    classes: Vec<Class>,
    class_names: HashMap<Rc<str>, ClassId>,
    fields: Vec<Field>,
    methods: Vec<Method>,
    vars: Vec<Var>,
    allocs: Vec<Allocation>,
    invokes: Vec<Invoke>,
    entry: MethodId,
}

impl Program {
    pub fn entry_method(&self) -> MethodId {
        self.entry
    }

    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.index()]
    }

    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.index()]
    }

    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.index()]
    }

    pub fn alloc(&self, id: AllocId) -> &Allocation {
        &self.allocs[id.index()]
    }

    pub fn invoke(&self, id: InvokeId) -> &Invoke {
        &self.invokes[id.index()]
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn num_methods(&self) -> usize {
        self.methods.len()
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> {
        (0..self.classes.len()).map(ClassId::from_index)
    }

    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> {
        (0..self.methods.len()).map(MethodId::from_index)
    }

    pub fn var_ids(&self) -> impl Iterator<Item = VarId> {
        (0..self.vars.len()).map(VarId::from_index)
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }

    /// Looks up a method declared directly in `class`.
    pub fn lookup_method(&self, class: &str, subsignature: &str) -> Option<MethodId> {
        let class = self.class_by_name(class)?;
        self.class(class)
            .declared_method(&Subsignature::new(subsignature))
    }

    /// Looks up a local variable of a method given as `Class.subsignature`.
    pub fn lookup_var(&self, method: &str, name: &str) -> Option<VarId> {
        let (class, subsignature) = split_member_ref(method)?;
        let method = self.lookup_method(class, subsignature)?;
        self.method(method).var_by_name(name)
    }

    /// Looks up a field given as `Class.field`, resolving it upwards through
    /// the superclasses of `Class`.
    pub fn lookup_field(&self, field_ref: &str) -> Option<FieldId> {
        let (class, name) = split_member_ref(field_ref)?;
        self.resolve_field(self.class_by_name(class)?, name)
    }

    pub fn class_name(&self, id: ClassId) -> &str {
        &self.class(id).name
    }

    /// `Class.subsignature`
    pub fn method_signature(&self, id: MethodId) -> String {
        let method = self.method(id);
        format!("{}.{}", self.class_name(method.class), method.subsignature)
    }

    /// `Class.field`
    pub fn field_signature(&self, id: FieldId) -> String {
        let field = self.field(id);
        format!("{}.{}", self.class_name(field.class), field.name)
    }

    /// `name@Class.subsignature`
    pub fn var_signature(&self, id: VarId) -> String {
        let var = self.var(id);
        format!("{}@{}", var.name, self.method_signature(var.method))
    }

    /// `Class.subsignature#stmt`
    pub fn invoke_signature(&self, id: InvokeId) -> String {
        let invoke = self.invoke(id);
        format!(
            "{}#{}",
            self.method_signature(invoke.container),
            invoke.stmt_index
        )
    }

    /// `new T@Class.subsignature#stmt`
    pub fn alloc_signature(&self, id: AllocId) -> String {
        let alloc = self.alloc(id);
        format!(
            "new {}@{}#{}",
            self.class_name(alloc.class),
            self.method_signature(alloc.container),
            alloc.stmt_index
        )
    }
}

/// Splits `Class.member` at the last dot that is not part of a parameter
/// list, so that both `a.b.C.f` and `a.b.C.m(a.b.D)` split after `C`.
pub(crate) fn split_member_ref(member_ref: &str) -> Option<(&str, &str)> {
    let head = match member_ref.find('(') {
        Some(i) => &member_ref[..i],
        None => member_ref,
    };
    let dot = head.rfind('.')?;
    let (class, member) = (&member_ref[..dot], &member_ref[dot + 1..]);
    (!class.is_empty() && !member.is_empty()).then_some((class, member))
}
