use std::fmt::{self, Debug, Display, Formatter};

use crate::program::{AllocId, ClassId, Program};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ObjKind {
    /// All objects created by one allocation site.
    Alloc(AllocId),
    /// All objects of one type, wherever they were allocated.
    Merged(ClassId),
}

/// Abstract object, i.e. the static stand-in for a set of runtime objects.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Obj {
    pub kind: ObjKind,
    /// Declared type of the represented objects, the dispatch type for
    /// calls on them.
    pub ty: ClassId,
    /// Class containing the allocation site, if there is a single one.
    pub container: Option<ClassId>,
}

impl Obj {
    pub fn describe(&self, program: &Program) -> String {
        match self.kind {
            ObjKind::Alloc(site) => program.alloc_signature(site),
            ObjKind::Merged(ty) => format!("merged {}", program.class_name(ty)),
        }
    }
}

pub trait HeapModel: Debug {
    fn get_obj(&self, program: &Program, site: AllocId) -> Obj;
}

/// One abstract object per allocation site.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllocationSiteHeapModel;

impl HeapModel for AllocationSiteHeapModel {
    fn get_obj(&self, program: &Program, site: AllocId) -> Obj {
        let alloc = program.alloc(site);
        Obj {
            kind: ObjKind::Alloc(site),
            ty: alloc.class,
            container: Some(program.method(alloc.container).class),
        }
    }
}

/// One abstract object per allocated type. Cheaper and less precise than
/// [`AllocationSiteHeapModel`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TypeHeapModel;

impl HeapModel for TypeHeapModel {
    fn get_obj(&self, program: &Program, site: AllocId) -> Obj {
        let ty = program.alloc(site).class;
        Obj {
            kind: ObjKind::Merged(ty),
            ty,
            container: None,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum HeapModelKind {
    #[default]
    AllocationSite,
    Type,
}

impl HeapModelKind {
    pub fn model(self) -> Box<dyn HeapModel> {
        match self {
            HeapModelKind::AllocationSite => Box::new(AllocationSiteHeapModel),
            HeapModelKind::Type => Box::new(TypeHeapModel),
        }
    }
}

impl Display for HeapModelKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            HeapModelKind::AllocationSite => write!(f, "allocation-site"),
            HeapModelKind::Type => write!(f, "type"),
        }
    }
}
