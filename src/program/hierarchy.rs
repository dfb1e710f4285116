use std::collections::VecDeque;

use hashbrown::HashSet;

use super::{CallKind, ClassId, FieldId, Invoke, MethodId, MethodRef, Program, Subsignature};

impl Program {
    /// Finds the method that an object of runtime type `class` executes for
    /// `subsignature`, walking up the superclass chain. Abstract
    /// declarations are skipped; `None` means dispatch fails for this type.
    pub fn dispatch(&self, class: ClassId, subsignature: &Subsignature) -> Option<MethodId> {
        let mut current = Some(class);
        while let Some(c) = current {
            let class = self.class(c);
            if let Some(m) = class.declared_method(subsignature) {
                if !self.method(m).is_abstract {
                    return Some(m);
                }
            }
            current = class.superclass;
        }
        None
    }

    /// Resolves the callee of `invoke`. `recv_type` is the runtime type of
    /// the receiver object and is only consulted for virtual and interface
    /// calls.
    pub fn resolve_callee(&self, recv_type: Option<ClassId>, invoke: &Invoke) -> Option<MethodId> {
        let MethodRef { class, subsignature } = &invoke.method_ref;
        match invoke.kind {
            CallKind::Static => self
                .class(*class)
                .declared_method(subsignature)
                .filter(|&m| self.method(m).is_static),
            CallKind::Special => self.dispatch(*class, subsignature),
            CallKind::Virtual | CallKind::Interface => {
                recv_type.and_then(|t| self.dispatch(t, subsignature))
            }
            CallKind::Dynamic => None,
        }
    }

    /// Looks up the field `name` in `class` and then in its superclasses.
    pub fn resolve_field(&self, class: ClassId, name: &str) -> Option<FieldId> {
        let mut current = Some(class);
        while let Some(c) = current {
            if let Some(f) = self.class(c).declared_field(name) {
                return Some(f);
            }
            current = self.class(c).superclass;
        }
        None
    }

    /// `class` together with everything below it: subclasses, implementors
    /// and sub-interfaces, transitively.
    pub fn subtypes_of(&self, class: ClassId) -> Vec<ClassId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([class]);
        let mut result = vec![];
        seen.insert(class);
        while let Some(c) = queue.pop_front() {
            result.push(c);
            let class = self.class(c);
            for &sub in class
                .direct_subclasses()
                .iter()
                .chain(class.direct_implementors())
                .chain(class.direct_subinterfaces())
            {
                if seen.insert(sub) {
                    queue.push_back(sub);
                }
            }
        }
        result
    }
}
