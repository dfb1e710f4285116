use std::fmt::{self, Debug, Formatter};

use roaring::RoaringBitmap;

use super::manager::CsObjId;

/// Set of context-sensitive abstract objects. Objects are stored by their
/// interned id, so membership and set algebra work on plain integers.
#[derive(Clone, Default, PartialEq)]
pub struct PointsToSet(RoaringBitmap);

impl PointsToSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(obj: CsObjId) -> Self {
        let mut set = Self::new();
        set.add(obj);
        set
    }

    /// Returns whether `obj` was not in the set before.
    pub fn add(&mut self, obj: CsObjId) -> bool {
        self.0.insert(obj.0)
    }

    pub fn contains(&self, obj: CsObjId) -> bool {
        self.0.contains(obj.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len() as usize
    }

    pub fn union_assign(&mut self, other: &Self) {
        self.0 |= &other.0;
    }

    /// Objects of `self` that are not in `other`.
    pub fn difference(&self, other: &Self) -> Self {
        Self(&self.0 - &other.0)
    }

    pub fn is_subset(&self, other: &Self) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = CsObjId> + '_ {
        self.0.iter().map(CsObjId)
    }
}

impl FromIterator<CsObjId> for PointsToSet {
    fn from_iter<T: IntoIterator<Item = CsObjId>>(iter: T) -> Self {
        Self(iter.into_iter().map(|o| o.0).collect())
    }
}

impl Debug for PointsToSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_set().entries(self.0.iter()).finish()
    }
}
