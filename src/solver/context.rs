use core::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter;

use itertools::Itertools;
use smallvec::SmallVec;

use super::heap::Obj;
use super::manager::ObjId;
use crate::program::{ClassId, InvokeId, MethodId};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ContextElem {
    CallSite(InvokeId),
    Obj(ObjId),
    Type(ClassId),
}

impl Display for ContextElem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ContextElem::CallSite(cs) => write!(f, "cs{}", cs.0),
            ContextElem::Obj(o) => write!(f, "o{}", o.0),
            ContextElem::Type(t) => write!(f, "t{}", t.0),
        }
    }
}

/// A bounded sequence of context elements, most recent last. Selectors keep
/// contexts finite by truncating from the front.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Context(SmallVec<[ContextElem; 2]>);

impl Context {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_elems(elems: &[ContextElem]) -> Self {
        Self(SmallVec::from_slice(elems))
    }

    pub fn elems(&self) -> &[ContextElem] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self ++ [elem]`, keeping the last `limit` elements.
    pub fn append(&self, elem: ContextElem, limit: usize) -> Self {
        let elems: SmallVec<[ContextElem; 3]> =
            self.0.iter().copied().chain(iter::once(elem)).collect();
        let skip = elems.len().saturating_sub(limit);
        Self::from_elems(&elems[skip..])
    }

    /// The last `k` elements.
    pub fn last(&self, k: usize) -> Self {
        Self::from_elems(&self.0[self.0.len().saturating_sub(k)..])
    }
}

impl Display for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

/// The receiver object of an instance call, as seen by a selector.
#[derive(Clone, Copy, Debug)]
pub struct Receiver<'a> {
    /// Heap context of the object.
    pub context: &'a Context,
    pub id: ObjId,
    pub obj: &'a Obj,
}

/// Context-sensitivity policy. Every method is analyzed once per distinct
/// context the policy hands out, so a policy producing finitely many
/// contexts guarantees termination.
pub trait ContextSelector: Debug {
    fn empty_context(&self) -> Context {
        Context::empty()
    }

    /// Heap context for an object allocated in a method analyzed under
    /// `method_context`.
    fn select_heap_context(&self, method_context: &Context, obj: &Obj) -> Context;

    /// Context of `callee` when called from `call_site` under `caller`.
    /// `receiver` is `None` for static calls.
    fn select_call_context(
        &self,
        caller: &Context,
        call_site: InvokeId,
        receiver: Option<Receiver<'_>>,
        callee: MethodId,
    ) -> Context;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ContextInsensitiveSelector;

impl ContextSelector for ContextInsensitiveSelector {
    fn select_heap_context(&self, _: &Context, _: &Obj) -> Context {
        Context::empty()
    }

    fn select_call_context(
        &self,
        _: &Context,
        _: InvokeId,
        _: Option<Receiver<'_>>,
        _: MethodId,
    ) -> Context {
        Context::empty()
    }
}

/// k-call-site sensitivity: the context is the string of the last `k` call
/// sites.
#[derive(Clone, Copy, Debug)]
pub struct CallStringSelector {
    call_string_length: usize,
    heap_length: usize,
}

impl CallStringSelector {
    /// Uses `k - 1` as the heap context length.
    pub fn new(k: usize) -> Self {
        Self::with_heap_length(k, k.saturating_sub(1))
    }

    pub fn with_heap_length(k: usize, heap_length: usize) -> Self {
        Self {
            call_string_length: k,
            heap_length,
        }
    }
}

impl ContextSelector for CallStringSelector {
    fn select_heap_context(&self, method_context: &Context, _: &Obj) -> Context {
        method_context.last(self.heap_length)
    }

    fn select_call_context(
        &self,
        caller: &Context,
        call_site: InvokeId,
        _: Option<Receiver<'_>>,
        _: MethodId,
    ) -> Context {
        caller.append(ContextElem::CallSite(call_site), self.call_string_length)
    }
}

/// k-object sensitivity: instance methods are analyzed under their receiver
/// object and its heap context, static methods inherit the caller context.
#[derive(Clone, Copy, Debug)]
pub struct ObjectSelector {
    k: usize,
    heap_length: usize,
}

impl ObjectSelector {
    pub fn new(k: usize) -> Self {
        Self::with_heap_length(k, k.saturating_sub(1))
    }

    pub fn with_heap_length(k: usize, heap_length: usize) -> Self {
        Self { k, heap_length }
    }
}

impl ContextSelector for ObjectSelector {
    fn select_heap_context(&self, method_context: &Context, _: &Obj) -> Context {
        method_context.last(self.heap_length)
    }

    fn select_call_context(
        &self,
        caller: &Context,
        _: InvokeId,
        receiver: Option<Receiver<'_>>,
        _: MethodId,
    ) -> Context {
        match receiver {
            Some(recv) => recv.context.append(ContextElem::Obj(recv.id), self.k),
            None => caller.clone(),
        }
    }
}

/// k-type sensitivity: like object sensitivity, but the receiver is
/// abstracted to the class containing its allocation site.
#[derive(Clone, Copy, Debug)]
pub struct TypeSelector {
    k: usize,
    heap_length: usize,
}

impl TypeSelector {
    pub fn new(k: usize) -> Self {
        Self::with_heap_length(k, k.saturating_sub(1))
    }

    pub fn with_heap_length(k: usize, heap_length: usize) -> Self {
        Self { k, heap_length }
    }
}

impl ContextSelector for TypeSelector {
    fn select_heap_context(&self, method_context: &Context, _: &Obj) -> Context {
        method_context.last(self.heap_length)
    }

    fn select_call_context(
        &self,
        caller: &Context,
        _: InvokeId,
        receiver: Option<Receiver<'_>>,
        _: MethodId,
    ) -> Context {
        match receiver {
            Some(recv) => {
                let ty = recv.obj.container.unwrap_or(recv.obj.ty);
                recv.context.append(ContextElem::Type(ty), self.k)
            }
            None => caller.clone(),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum SelectorKind {
    #[default]
    Insensitive,
    CallSite,
    Object,
    Type,
}

impl SelectorKind {
    pub fn selector(self, k: usize) -> Box<dyn ContextSelector> {
        match self {
            SelectorKind::Insensitive => Box::new(ContextInsensitiveSelector),
            SelectorKind::CallSite => Box::new(CallStringSelector::new(k)),
            SelectorKind::Object => Box::new(ObjectSelector::new(k)),
            SelectorKind::Type => Box::new(TypeSelector::new(k)),
        }
    }
}

impl Display for SelectorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKind::Insensitive => write!(f, "insensitive"),
            SelectorKind::CallSite => write!(f, "call-site"),
            SelectorKind::Object => write!(f, "object"),
            SelectorKind::Type => write!(f, "type"),
        }
    }
}
