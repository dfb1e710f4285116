use std::rc::Rc;

use hashbrown::{HashMap, HashSet};
use log::debug;

use super::{
    AllocId, Allocation, CallKind, Class, ClassId, ClassKind, Field, FieldId, Invoke, InvokeId,
    Method, MethodId, MethodRef, Program, Stmt, Subsignature, Var, VarId, VarUses,
};
use crate::error::ProgramError;

/// Incrementally assembles a [`Program`]. Structural checks that need the
/// whole program (hierarchy cycles, call resolution, arities) are deferred to
/// [`ProgramBuilder::build`].
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    classes: Vec<Class>,
    class_names: HashMap<Rc<str>, ClassId>,
    fields: Vec<Field>,
    methods: Vec<Method>,
    vars: Vec<Var>,
    allocs: Vec<Allocation>,
    invokes: Vec<Invoke>,
    entry: Option<MethodId>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(
        &mut self,
        name: &str,
        kind: ClassKind,
        superclass: Option<ClassId>,
    ) -> Result<ClassId, ProgramError> {
        if self.class_names.contains_key(name) {
            return Err(ProgramError::DuplicateClass(name.to_owned()));
        }
        let id = ClassId::from_index(self.classes.len());
        let mut class = Class::new(name, kind);
        class.superclass = superclass;
        self.class_names.insert(class.name.clone(), id);
        self.classes.push(class);
        Ok(id)
    }

    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }

    pub fn declared_method(&self, class: ClassId, subsignature: &str) -> Option<MethodId> {
        self.classes[class.index()].declared_method(&Subsignature::new(subsignature))
    }

    /// Upward field lookup. Gives up after visiting every class once, cyclic
    /// hierarchies are reported by `build`.
    pub fn resolve_field(&self, class: ClassId, name: &str) -> Option<FieldId> {
        let mut current = Some(class);
        for _ in 0..self.classes.len() {
            let class = &self.classes[current?.index()];
            if let Some(field) = class.declared_field(name) {
                return Some(field);
            }
            current = class.superclass;
        }
        None
    }

    pub fn set_superclass(&mut self, class: ClassId, superclass: Option<ClassId>) {
        self.classes[class.index()].superclass = superclass;
    }

    pub fn add_interface(&mut self, class: ClassId, interface: ClassId) {
        self.classes[class.index()].interfaces.push(interface);
    }

    pub fn set_abstract(&mut self, class: ClassId, is_abstract: bool) {
        self.classes[class.index()].is_abstract = is_abstract;
    }

    pub fn add_field(
        &mut self,
        class: ClassId,
        name: &str,
        is_static: bool,
    ) -> Result<FieldId, ProgramError> {
        let id = FieldId::from_index(self.fields.len());
        let owner = &mut self.classes[class.index()];
        if owner.fields.contains_key(name) {
            return Err(ProgramError::DuplicateField(format!(
                "{}.{name}",
                owner.name
            )));
        }
        let name: Rc<str> = Rc::from(name);
        owner.fields.insert(name.clone(), id);
        self.fields.push(Field {
            name,
            class,
            is_static,
        });
        Ok(id)
    }

    /// Declares a method and creates its parameter variables. Instance
    /// methods additionally get a `this` variable.
    pub fn add_method(
        &mut self,
        class: ClassId,
        subsignature: &str,
        is_static: bool,
        is_abstract: bool,
        params: &[&str],
    ) -> Result<MethodId, ProgramError> {
        let id = MethodId::from_index(self.methods.len());
        let subsignature = Subsignature::new(subsignature);
        let owner = &mut self.classes[class.index()];
        if owner.methods.contains_key(&subsignature) {
            return Err(ProgramError::DuplicateMethod(format!(
                "{}.{subsignature}",
                owner.name
            )));
        }
        owner.methods.insert(subsignature.clone(), id);
        self.methods.push(Method {
            subsignature,
            class,
            is_static,
            is_abstract,
            this: None,
            params: vec![],
            return_vars: vec![],
            stmts: vec![],
            var_names: HashMap::new(),
        });

        if !is_static {
            let this = self.var(id, "this");
            self.methods[id.index()].this = Some(this);
        }
        for param in params {
            let var = self.var(id, param);
            self.methods[id.index()].params.push(var);
        }
        Ok(id)
    }

    /// Returns the local variable `name` of `method`, creating it on first use.
    pub fn var(&mut self, method: MethodId, name: &str) -> VarId {
        if let Some(var) = self.methods[method.index()].var_by_name(name) {
            return var;
        }
        let id = VarId::from_index(self.vars.len());
        let name: Rc<str> = Rc::from(name);
        self.methods[method.index()]
            .var_names
            .insert(name.clone(), id);
        self.vars.push(Var {
            name,
            method,
            uses: VarUses::default(),
        });
        id
    }

    fn push(&mut self, method: MethodId, stmt: Stmt) -> usize {
        let stmts = &mut self.methods[method.index()].stmts;
        stmts.push(stmt);
        stmts.len() - 1
    }

    fn next_stmt_index(&self, method: MethodId) -> usize {
        self.methods[method.index()].stmts.len()
    }

    pub fn push_new(&mut self, method: MethodId, lhs: VarId, class: ClassId) -> AllocId {
        let id = AllocId::from_index(self.allocs.len());
        let stmt_index = self.next_stmt_index(method);
        self.allocs.push(Allocation {
            lhs,
            class,
            container: method,
            stmt_index,
        });
        self.push(method, Stmt::New(id));
        id
    }

    pub fn push_copy(&mut self, method: MethodId, lhs: VarId, rhs: VarId) {
        self.push(method, Stmt::Copy { lhs, rhs });
    }

    pub fn push_load_field(&mut self, method: MethodId, lhs: VarId, base: VarId, field: FieldId) {
        self.push(method, Stmt::LoadField { lhs, base, field });
    }

    pub fn push_store_field(&mut self, method: MethodId, base: VarId, field: FieldId, rhs: VarId) {
        self.push(method, Stmt::StoreField { base, field, rhs });
    }

    pub fn push_load_static(&mut self, method: MethodId, lhs: VarId, field: FieldId) {
        self.push(method, Stmt::LoadStatic { lhs, field });
    }

    pub fn push_store_static(&mut self, method: MethodId, field: FieldId, rhs: VarId) {
        self.push(method, Stmt::StoreStatic { field, rhs });
    }

    pub fn push_load_array(&mut self, method: MethodId, lhs: VarId, base: VarId) {
        self.push(method, Stmt::LoadArray { lhs, base });
    }

    pub fn push_store_array(&mut self, method: MethodId, base: VarId, rhs: VarId) {
        self.push(method, Stmt::StoreArray { base, rhs });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_invoke(
        &mut self,
        method: MethodId,
        kind: CallKind,
        class: ClassId,
        subsignature: &str,
        receiver: Option<VarId>,
        args: &[VarId],
        result: Option<VarId>,
    ) -> InvokeId {
        let id = InvokeId::from_index(self.invokes.len());
        let stmt_index = self.next_stmt_index(method);
        self.invokes.push(Invoke {
            kind,
            method_ref: MethodRef {
                class,
                subsignature: Subsignature::new(subsignature),
            },
            receiver,
            args: args.to_vec(),
            result,
            container: method,
            stmt_index,
        });
        self.push(method, Stmt::Invoke(id));
        id
    }

    pub fn push_return(&mut self, method: MethodId, var: Option<VarId>) {
        if let Some(var) = var {
            let return_vars = &mut self.methods[method.index()].return_vars;
            if !return_vars.contains(&var) {
                return_vars.push(var);
            }
        }
        self.push(method, Stmt::Return(var));
    }

    pub fn set_entry(&mut self, method: MethodId) {
        self.entry = Some(method);
    }

    /// Links the hierarchy, indexes variable uses and validates the model.
    pub fn build(mut self) -> Result<Program, ProgramError> {
        let entry = self.entry.ok_or(ProgramError::MissingEntry)?;
        self.link_hierarchy()?;
        self.index_var_uses();

        let program = Program {
            classes: self.classes,
            class_names: self.class_names,
            fields: self.fields,
            methods: self.methods,
            vars: self.vars,
            allocs: self.allocs,
            invokes: self.invokes,
            entry,
        };
        program.validate()?;
        debug!(
            "Built program with {} classes, {} methods and {} variables",
            program.num_classes(),
            program.num_methods(),
            program.num_vars()
        );
        Ok(program)
    }

    fn link_hierarchy(&mut self) -> Result<(), ProgramError> {
        for i in 0..self.classes.len() {
            let id = ClassId::from_index(i);

            let mut seen = HashSet::new();
            let mut current = Some(id);
            while let Some(c) = current {
                if !seen.insert(c) {
                    return Err(ProgramError::HierarchyCycle(
                        self.classes[i].name.to_string(),
                    ));
                }
                current = self.classes[c.index()].superclass;
            }

            if let Some(superclass) = self.classes[i].superclass {
                self.classes[superclass.index()].subclasses.push(id);
            }
            let is_interface = self.classes[i].is_interface();
            for interface in self.classes[i].interfaces.clone() {
                let interface = &mut self.classes[interface.index()];
                if is_interface {
                    interface.subinterfaces.push(id);
                } else {
                    interface.implementors.push(id);
                }
            }
        }
        Ok(())
    }

    fn index_var_uses(&mut self) {
        for method in &self.methods {
            for stmt in &method.stmts {
                match *stmt {
                    Stmt::StoreField { base, field, rhs } => {
                        self.vars[base.index()].uses.store_fields.push((field, rhs))
                    }
                    Stmt::LoadField { lhs, base, field } => {
                        self.vars[base.index()].uses.load_fields.push((lhs, field))
                    }
                    Stmt::StoreArray { base, rhs } => {
                        self.vars[base.index()].uses.store_arrays.push(rhs)
                    }
                    Stmt::LoadArray { lhs, base } => {
                        self.vars[base.index()].uses.load_arrays.push(lhs)
                    }
                    Stmt::Invoke(invoke) => {
                        if let Some(receiver) = self.invokes[invoke.index()].receiver {
                            self.vars[receiver.index()].uses.invokes.push(invoke);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

impl Program {
    fn validate(&self) -> Result<(), ProgramError> {
        let entry = self.method(self.entry);
        if !entry.is_static || entry.is_abstract {
            return Err(ProgramError::InvalidEntry(
                self.method_signature(self.entry),
            ));
        }

        for method_id in self.method_ids() {
            for stmt in &self.method(method_id).stmts {
                self.validate_stmt(method_id, stmt)?;
            }
        }
        Ok(())
    }

    fn validate_stmt(&self, method: MethodId, stmt: &Stmt) -> Result<(), ProgramError> {
        let check_var = |var: VarId| {
            if self.var(var).method == method {
                Ok(())
            } else {
                Err(ProgramError::ForeignVariable {
                    var: self.var_signature(var),
                    method: self.method_signature(method),
                })
            }
        };
        let check_field = |field: FieldId, is_static: bool| {
            if self.field(field).is_static == is_static {
                Ok(())
            } else {
                Err(ProgramError::FieldKindMismatch(self.field_signature(field)))
            }
        };

        match *stmt {
            Stmt::New(alloc) => check_var(self.alloc(alloc).lhs),
            Stmt::Copy { lhs, rhs }
            | Stmt::LoadArray { lhs, base: rhs }
            | Stmt::StoreArray { base: lhs, rhs } => {
                check_var(lhs)?;
                check_var(rhs)
            }
            Stmt::LoadField { lhs, base, field } => {
                check_var(lhs)?;
                check_var(base)?;
                check_field(field, false)
            }
            Stmt::StoreField { base, field, rhs } => {
                check_var(base)?;
                check_var(rhs)?;
                check_field(field, false)
            }
            Stmt::LoadStatic { lhs: var, field } | Stmt::StoreStatic { field, rhs: var } => {
                check_var(var)?;
                check_field(field, true)
            }
            Stmt::Return(var) => var.map_or(Ok(()), check_var),
            Stmt::Invoke(invoke_id) => {
                let invoke = self.invoke(invoke_id);
                invoke
                    .receiver
                    .iter()
                    .chain(&invoke.args)
                    .chain(&invoke.result)
                    .try_for_each(|&var| check_var(var))?;
                self.validate_invoke(invoke_id)
            }
        }
    }

    fn validate_invoke(&self, invoke_id: InvokeId) -> Result<(), ProgramError> {
        let invoke = self.invoke(invoke_id);
        let call_site = || self.invoke_signature(invoke_id);

        match (invoke.kind, invoke.receiver) {
            (CallKind::Static, Some(_)) => {
                return Err(ProgramError::UnexpectedReceiver(call_site()))
            }
            (CallKind::Special | CallKind::Virtual | CallKind::Interface, None) => {
                return Err(ProgramError::MissingReceiver(call_site()))
            }
            _ => {}
        }

        let candidates: Vec<MethodId> = match invoke.kind {
            CallKind::Static | CallKind::Special => {
                let target = self
                    .resolve_callee(None, invoke)
                    .ok_or_else(|| ProgramError::UnresolvedCall(call_site()))?;
                vec![target]
            }
            // Whatever dispatch picks for a subtype, inherited or declared,
            // must accept the arguments. Abstract declarations are checked too.
            CallKind::Virtual | CallKind::Interface => {
                let subsignature = &invoke.method_ref.subsignature;
                let subtypes = self.subtypes_of(invoke.method_ref.class);
                let dispatched = subtypes.iter().filter_map(|&c| self.dispatch(c, subsignature));
                let declared = subtypes
                    .iter()
                    .filter_map(|&c| self.class(c).declared_method(subsignature));
                dispatched.chain(declared).collect()
            }
            CallKind::Dynamic => vec![],
        };

        for callee in candidates {
            let expected = self.method(callee).params.len();
            if expected != invoke.args.len() {
                return Err(ProgramError::ArityMismatch {
                    call_site: call_site(),
                    callee: self.method_signature(callee),
                    expected,
                    found: invoke.args.len(),
                });
            }
        }
        Ok(())
    }
}
