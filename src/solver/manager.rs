use std::hash::Hash;

use indexmap::IndexSet;

use super::context::Context;
use super::heap::Obj;
use super::pts::PointsToSet;
use crate::index_type;
use crate::program::{FieldId, InvokeId, MethodId, VarId};

index_type!(pub struct ContextId;);
index_type!(pub struct ObjId;);
index_type!(
    /// Abstract object qualified with a heap context.
    pub struct CsObjId;
);
index_type!(
    /// Method qualified with the context it is analyzed under.
    pub struct CsMethodId;
);
index_type!(
    /// Call site qualified with the context of its containing method.
    pub struct CsCallSiteId;
);
index_type!(pub struct PointerId;);

/// Abstract storage location. Each pointer owns one points-to set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Pointer {
    Var { context: ContextId, var: VarId },
    InstanceField { base: CsObjId, field: FieldId },
    StaticField(FieldId),
    /// Summary cell for all elements of an array object.
    ArrayIndex(CsObjId),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CsObj {
    pub context: ContextId,
    pub obj: ObjId,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CsMethod {
    pub context: ContextId,
    pub method: MethodId,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct CsCallSite {
    pub context: ContextId,
    pub invoke: InvokeId,
}

/// Interning table: equal values get the same id for as long as the table
/// lives.
#[derive(Debug)]
struct Interner<T, I> {
    values: IndexSet<T>,
    to_id: fn(usize) -> I,
}

impl<T: Hash + Eq, I: Copy> Interner<T, I> {
    fn new(to_id: fn(usize) -> I) -> Self {
        Self {
            values: IndexSet::new(),
            to_id,
        }
    }

    fn intern(&mut self, value: T) -> I {
        let (index, _) = self.values.insert_full(value);
        (self.to_id)(index)
    }

    fn get(&self, value: &T) -> Option<I> {
        self.values.get_index_of(value).map(self.to_id)
    }

    fn value(&self, index: usize) -> &T {
        &self.values[index]
    }

    fn len(&self) -> usize {
        self.values.len()
    }
}

/// Canonicalizes every context-qualified entity of the analysis and owns the
/// points-to sets of all pointers. It is the only place new entities are
/// created; everything else refers to them by id.
#[derive(Debug)]
pub struct CsManager {
    contexts: Interner<Context, ContextId>,
    objs: Interner<Obj, ObjId>,
    cs_objs: Interner<CsObj, CsObjId>,
    cs_methods: Interner<CsMethod, CsMethodId>,
    cs_call_sites: Interner<CsCallSite, CsCallSiteId>,
    pointers: Interner<Pointer, PointerId>,
    points_to: Vec<PointsToSet>,
}

impl Default for CsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CsManager {
    pub fn new() -> Self {
        Self {
            contexts: Interner::new(ContextId::from_index),
            objs: Interner::new(ObjId::from_index),
            cs_objs: Interner::new(CsObjId::from_index),
            cs_methods: Interner::new(CsMethodId::from_index),
            cs_call_sites: Interner::new(CsCallSiteId::from_index),
            pointers: Interner::new(PointerId::from_index),
            points_to: vec![],
        }
    }

    pub fn context_id(&mut self, context: Context) -> ContextId {
        self.contexts.intern(context)
    }

    pub fn context(&self, id: ContextId) -> &Context {
        self.contexts.value(id.index())
    }

    pub fn lookup_context(&self, context: &Context) -> Option<ContextId> {
        self.contexts.get(context)
    }

    pub fn obj_id(&mut self, obj: Obj) -> ObjId {
        self.objs.intern(obj)
    }

    pub fn obj(&self, id: ObjId) -> &Obj {
        self.objs.value(id.index())
    }

    pub fn cs_obj(&mut self, context: ContextId, obj: ObjId) -> CsObjId {
        self.cs_objs.intern(CsObj { context, obj })
    }

    pub fn cs_obj_value(&self, id: CsObjId) -> CsObj {
        *self.cs_objs.value(id.index())
    }

    pub fn cs_method(&mut self, context: ContextId, method: MethodId) -> CsMethodId {
        self.cs_methods.intern(CsMethod { context, method })
    }

    pub fn cs_method_value(&self, id: CsMethodId) -> CsMethod {
        *self.cs_methods.value(id.index())
    }

    pub fn cs_call_site(&mut self, context: ContextId, invoke: InvokeId) -> CsCallSiteId {
        self.cs_call_sites.intern(CsCallSite { context, invoke })
    }

    pub fn cs_call_site_value(&self, id: CsCallSiteId) -> CsCallSite {
        *self.cs_call_sites.value(id.index())
    }

    fn pointer(&mut self, pointer: Pointer) -> PointerId {
        let id = self.pointers.intern(pointer);
        if id.index() == self.points_to.len() {
            self.points_to.push(PointsToSet::new());
        }
        id
    }

    pub fn cs_var(&mut self, context: ContextId, var: VarId) -> PointerId {
        self.pointer(Pointer::Var { context, var })
    }

    pub fn instance_field(&mut self, base: CsObjId, field: FieldId) -> PointerId {
        self.pointer(Pointer::InstanceField { base, field })
    }

    pub fn static_field(&mut self, field: FieldId) -> PointerId {
        self.pointer(Pointer::StaticField(field))
    }

    pub fn array_index(&mut self, base: CsObjId) -> PointerId {
        self.pointer(Pointer::ArrayIndex(base))
    }

    /// Looks up a pointer without creating it.
    pub fn lookup_pointer(&self, pointer: &Pointer) -> Option<PointerId> {
        self.pointers.get(pointer)
    }

    pub fn pointer_value(&self, id: PointerId) -> Pointer {
        *self.pointers.value(id.index())
    }

    pub fn points_to(&self, id: PointerId) -> &PointsToSet {
        &self.points_to[id.index()]
    }

    pub(super) fn points_to_mut(&mut self, id: PointerId) -> &mut PointsToSet {
        &mut self.points_to[id.index()]
    }

    pub fn pointers(&self) -> impl Iterator<Item = (PointerId, Pointer)> + '_ {
        self.pointers
            .values
            .iter()
            .enumerate()
            .map(|(i, &p)| (PointerId::from_index(i), p))
    }

    pub fn cs_objs(&self) -> impl Iterator<Item = (CsObjId, CsObj)> + '_ {
        self.cs_objs
            .values
            .iter()
            .enumerate()
            .map(|(i, &o)| (CsObjId::from_index(i), o))
    }

    pub fn num_contexts(&self) -> usize {
        self.contexts.len()
    }

    pub fn num_objs(&self) -> usize {
        self.objs.len()
    }

    pub fn num_cs_objs(&self) -> usize {
        self.cs_objs.len()
    }

    pub fn num_cs_methods(&self) -> usize {
        self.cs_methods.len()
    }

    pub fn num_pointers(&self) -> usize {
        self.pointers.len()
    }
}
