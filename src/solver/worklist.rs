use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;

use super::manager::{CsCallSiteId, CsMethodId, PointerId};
use super::pts::PointsToSet;
use crate::call_graph::Edge;

pub type CsEdge = Edge<CsCallSiteId, CsMethodId>;

/// Order in which pending pointers are handed out. The fixpoint does not
/// depend on it, the sequence of intermediate states does.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum WorkOrder {
    #[default]
    Fifo,
    Lifo,
}

impl Display for WorkOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            WorkOrder::Fifo => write!(f, "fifo"),
            WorkOrder::Lifo => write!(f, "lifo"),
        }
    }
}

#[derive(Debug)]
pub enum WorkItem {
    PointsTo(PointerId, PointsToSet),
    CallEdge(CsEdge),
}

/// Pending work of the solver. Points-to entries for the same pointer are
/// merged while they wait, so a pointer is queued at most once at a time.
/// Call edges are always handed out before points-to entries.
#[derive(Debug, Default)]
pub struct WorkList {
    order: WorkOrder,
    queue: VecDeque<PointerId>,
    pending: HashMap<PointerId, PointsToSet>,
    call_edges: VecDeque<CsEdge>,
}

impl WorkList {
    pub fn new(order: WorkOrder) -> Self {
        Self {
            order,
            ..Default::default()
        }
    }

    pub fn add_points_to(&mut self, pointer: PointerId, pts: PointsToSet) {
        if pts.is_empty() {
            return;
        }
        match self.pending.entry(pointer) {
            Entry::Occupied(mut entry) => entry.get_mut().union_assign(&pts),
            Entry::Vacant(entry) => {
                entry.insert(pts);
                self.queue.push_back(pointer);
            }
        }
    }

    pub fn add_call_edge(&mut self, edge: CsEdge) {
        self.call_edges.push_back(edge);
    }

    pub fn poll(&mut self) -> Option<WorkItem> {
        if let Some(edge) = self.call_edges.pop_front() {
            return Some(WorkItem::CallEdge(edge));
        }
        let pointer = match self.order {
            WorkOrder::Fifo => self.queue.pop_front(),
            WorkOrder::Lifo => self.queue.pop_back(),
        }?;
        let pts = self
            .pending
            .remove(&pointer)
            .expect("queued pointer should have a pending points-to set");
        Some(WorkItem::PointsTo(pointer, pts))
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty() && self.call_edges.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len() + self.call_edges.len()
    }
}
