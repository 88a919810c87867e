//! The pipeline graph.
//!
//! A [`Pipeline`] is a cheap, cloneable handle to an arena of units plus the
//! edges between them. Every rank builds the same pipeline with the same
//! calls in the same order, so unit ids (and everything the scheduler derives
//! from them) agree across ranks without any coordination.
//!
//! Edges carry a destination port. Connecting the same `(from, to, port)`
//! twice is a no-op.

use crate::type_token::TypeTag;
use crate::unit::{Unit, UnitKind};
use crate::unit_id::UnitId;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: UnitId,
    pub to: UnitId,
    pub port: usize,
}

/// Shared handle to a pipeline graph.
#[derive(Clone, Default)]
pub struct Pipeline {
    pub(crate) inner: Arc<Mutex<PipelineInner>>,
}

#[derive(Default)]
pub struct PipelineInner {
    next_id: u64,
    pub(crate) units: HashMap<UnitId, Box<dyn Unit>>,
    pub(crate) edges: Vec<Edge>,
}

impl Pipeline {
    pub(crate) fn lock(&self) -> MutexGuard<'_, PipelineInner> {
        self.inner.lock().expect("pipeline lock poisoned")
    }

    pub(crate) fn insert_unit(&self, unit: Box<dyn Unit>) -> UnitId {
        let mut g = self.lock();
        let id = UnitId::new(g.next_id);
        g.next_id += 1;
        g.units.insert(id, unit);
        id
    }

    /// Add the edge `from -> to` on input `port` of `to`.
    ///
    /// # Panics
    /// If either unit is not part of this pipeline, or `port` is out of range.
    /// Both are wiring bugs in the calling program.
    pub(crate) fn connect(&self, from: UnitId, to: UnitId, port: usize) {
        let mut g = self.lock();
        assert!(g.units.contains_key(&from), "connect: unknown source unit {from}");
        let ports = g
            .units
            .get(&to)
            .unwrap_or_else(|| panic!("connect: unknown destination unit {to}"))
            .ports();
        assert!(port < ports, "connect: unit {to} has no input port {port}");
        let edge = Edge { from, to, port };
        if !g.edges.contains(&edge) {
            g.edges.push(edge);
        }
    }

    /// Remove a unit and every edge touching it.
    pub(crate) fn detach(&self, id: UnitId) {
        let mut g = self.lock();
        g.units.remove(&id);
        g.edges.retain(|e| e.from != id && e.to != id);
    }

    /// Whether both handles point at the same graph.
    pub fn same_as(&self, other: &Pipeline) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn unit_count(&self) -> usize {
        self.lock().units.len()
    }

    pub fn edge_count(&self) -> usize {
        self.lock().edges.len()
    }

    /// `(id, kind, label)` of every unit, in id order.
    pub fn describe(&self) -> Vec<(UnitId, UnitKind, String)> {
        let g = self.lock();
        let mut out: Vec<_> = g
            .units
            .iter()
            .map(|(id, u)| (*id, u.kind(), u.label()))
            .collect();
        out.sort_by_key(|(id, _, _)| *id);
        out
    }

    /// Element type of the rows `id` emits.
    pub fn row_type(&self, id: UnitId) -> Option<TypeTag> {
        self.lock().units.get(&id).map(|u| u.row_tag())
    }

    /// Roots of every unit connected (in either direction) to `id`.
    pub fn roots_of(&self, id: UnitId) -> Vec<UnitId> {
        self.lock().component_roots(id)
    }
}

impl PipelineInner {
    pub(crate) fn kind(&self, id: UnitId) -> Option<UnitKind> {
        self.units.get(&id).map(|u| u.kind())
    }

    /// Out-edges of `id` as `(to, port)`, in insertion order.
    pub(crate) fn successors(&self, id: UnitId) -> Vec<(UnitId, usize)> {
        self.edges
            .iter()
            .filter(|e| e.from == id)
            .map(|e| (e.to, e.port))
            .collect()
    }

    fn predecessors(&self, id: UnitId) -> impl Iterator<Item = UnitId> + '_ {
        self.edges.iter().filter(move |e| e.to == id).map(|e| e.from)
    }

    /// Roots reached by walking edges backwards from `id`.
    fn upstream_roots(&self, id: UnitId) -> BTreeSet<UnitId> {
        let mut roots = BTreeSet::new();
        let mut seen = BTreeSet::from([id]);
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if self.kind(cur) == Some(UnitKind::Root) {
                roots.insert(cur);
            }
            for up in self.predecessors(cur) {
                if seen.insert(up) {
                    stack.push(up);
                }
            }
        }
        roots
    }

    /// Every root feeding any unit reachable from the roots upstream of `id`.
    ///
    /// Walking back from `id` alone misses roots that only feed a side input
    /// of some downstream unit; such a unit would then wait forever for an end
    /// signal. Closing over the whole connected component avoids that.
    pub(crate) fn component_roots(&self, id: UnitId) -> Vec<UnitId> {
        let mut roots = self.upstream_roots(id);
        loop {
            let before = roots.len();
            let reach = self.forward(&roots.iter().copied().collect::<Vec<_>>());
            for u in reach {
                roots.extend(self.upstream_roots(u));
            }
            if roots.len() == before {
                break;
            }
        }
        roots.into_iter().collect()
    }

    /// Units reachable from `from` (inclusive), in breadth-first order.
    pub(crate) fn forward(&self, from: &[UnitId]) -> Vec<UnitId> {
        let mut seen: BTreeSet<UnitId> = from.iter().copied().collect();
        let mut queue: VecDeque<UnitId> = from.iter().copied().collect();
        let mut order = Vec::new();
        while let Some(cur) = queue.pop_front() {
            order.push(cur);
            for (next, _) in self.successors(cur) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        order
    }

    /// Tasks reachable from `root`, breadth first, not crossing into `skip`.
    pub(crate) fn branch_tasks(&self, root: UnitId, skip: &BTreeSet<UnitId>) -> Vec<UnitId> {
        self.forward(&[root])
            .into_iter()
            .filter(|u| !skip.contains(u) && self.kind(*u) == Some(UnitKind::Task))
            .collect()
    }

    /// Number of edges entering `(id, port)` from within `scope`.
    pub(crate) fn in_degree(&self, id: UnitId, port: usize, scope: &BTreeSet<UnitId>) -> usize {
        self.edges
            .iter()
            .filter(|e| e.to == id && e.port == port && scope.contains(&e.from))
            .count()
    }
}
