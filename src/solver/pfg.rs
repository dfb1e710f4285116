use hashbrown::HashSet;
use indexmap::IndexSet;

use super::manager::PointerId;

/// Pointer flow graph: an edge `s -> t` means everything `s` points to also
/// flows into `t`.
#[derive(Debug, Default)]
pub struct PointerFlowGraph {
    succs: Vec<IndexSet<PointerId>>,
    num_edges: usize,
}

impl PointerFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the edge is new.
    pub fn add_edge(&mut self, source: PointerId, target: PointerId) -> bool {
        if self.succs.len() <= source.index() {
            self.succs.resize_with(source.index() + 1, IndexSet::new);
        }
        let added = self.succs[source.index()].insert(target);
        if added {
            self.num_edges += 1;
        }
        added
    }

    pub fn has_edge(&self, source: PointerId, target: PointerId) -> bool {
        self.succs
            .get(source.index())
            .is_some_and(|s| s.contains(&target))
    }

    pub fn succs_of(&self, pointer: PointerId) -> impl Iterator<Item = PointerId> + '_ {
        self.succs
            .get(pointer.index())
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    pub fn edges(&self) -> impl Iterator<Item = (PointerId, PointerId)> + '_ {
        self.succs.iter().enumerate().flat_map(|(i, succs)| {
            succs
                .iter()
                .map(move |&t| (PointerId::from_index(i), t))
        })
    }

    /// Pointers with at least one incident edge.
    pub fn nodes(&self) -> HashSet<PointerId> {
        self.edges().flat_map(|(s, t)| [s, t]).collect()
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }
}
