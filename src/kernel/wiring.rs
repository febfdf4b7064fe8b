//! The process-wide connection table.
//!
//! Every connector registers here on construction and leaves on drop. Edges
//! are stored symmetrically in one adjacency map behind a single lock, so a
//! connect or disconnect is one atomic structural change: no observer can see
//! an edge recorded for one peer but not the other.
//!
//! Connector handles must never be dropped while the lock is held, since a
//! drop re-enters the table. Callers upgrade the returned weak handles only
//! after the call returns.

use crate::kernel::connector::ConnectorInner;
use crate::kernel::id::ConnectorId;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::{LazyLock, Weak};

pub(crate) static CONNECTIONS: LazyLock<ConnectionTable> = LazyLock::new(ConnectionTable::new);

/// Result of an attempted link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Link {
    Created,
    AlreadyLinked,
    InputOccupied,
}

#[derive(Default)]
struct Wiring {
    nodes: HashMap<ConnectorId, Weak<ConnectorInner>>,
    adjacency: HashMap<ConnectorId, BTreeSet<ConnectorId>>,
}

impl Wiring {
    fn weak(&self, id: ConnectorId) -> Option<Weak<ConnectorInner>> {
        self.nodes.get(&id).cloned()
    }

    fn neighbours(&self, id: ConnectorId) -> Vec<(ConnectorId, Weak<ConnectorInner>)> {
        self.adjacency
            .get(&id)
            .map(|peers| {
                peers
                    .iter()
                    .filter_map(|peer| self.weak(*peer).map(|w| (*peer, w)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn remove_edges_of(&mut self, id: ConnectorId) -> Vec<(ConnectorId, Weak<ConnectorInner>)> {
        let removed = self.neighbours(id);
        if let Some(peers) = self.adjacency.remove(&id) {
            for peer in peers {
                if let Some(set) = self.adjacency.get_mut(&peer) {
                    set.remove(&id);
                }
            }
        }
        removed
    }
}

pub(crate) struct ConnectionTable {
    inner: RwLock<Wiring>,
}

impl ConnectionTable {
    fn new() -> Self {
        Self {
            inner: RwLock::new(Wiring::default()),
        }
    }

    pub(crate) fn register(&self, id: ConnectorId, node: Weak<ConnectorInner>) {
        let mut wiring = self.inner.write();
        wiring.nodes.insert(id, node);
        wiring.adjacency.entry(id).or_default();
    }

    /// Link an input to an output. An input holds at most one edge.
    pub(crate) fn link(&self, input: ConnectorId, output: ConnectorId) -> Link {
        let mut wiring = self.inner.write();
        let occupied = match wiring.adjacency.get(&input) {
            Some(peers) if peers.contains(&output) => return Link::AlreadyLinked,
            Some(peers) => !peers.is_empty(),
            None => false,
        };
        if occupied {
            return Link::InputOccupied;
        }
        wiring.adjacency.entry(input).or_default().insert(output);
        wiring.adjacency.entry(output).or_default().insert(input);
        Link::Created
    }

    /// Remove the edge between `a` and `b`. False if there was none.
    pub(crate) fn unlink(&self, a: ConnectorId, b: ConnectorId) -> bool {
        let mut wiring = self.inner.write();
        let had_edge = wiring
            .adjacency
            .get_mut(&a)
            .map(|peers| peers.remove(&b))
            .unwrap_or(false);
        if let Some(peers) = wiring.adjacency.get_mut(&b) {
            peers.remove(&a);
        }
        had_edge
    }

    /// Remove every edge touching `id`, returning the former peers.
    pub(crate) fn unlink_all(&self, id: ConnectorId) -> Vec<(ConnectorId, Weak<ConnectorInner>)> {
        self.inner.write().remove_edges_of(id)
    }

    /// Forget `id` entirely, returning the former peers.
    pub(crate) fn detach(&self, id: ConnectorId) -> Vec<(ConnectorId, Weak<ConnectorInner>)> {
        let mut wiring = self.inner.write();
        let removed = wiring.remove_edges_of(id);
        wiring.nodes.remove(&id);
        removed
    }

    pub(crate) fn peers(&self, id: ConnectorId) -> Vec<(ConnectorId, Weak<ConnectorInner>)> {
        self.inner.read().neighbours(id)
    }

    pub(crate) fn is_linked(&self, a: ConnectorId, b: ConnectorId) -> bool {
        self.inner
            .read()
            .adjacency
            .get(&a)
            .is_some_and(|peers| peers.contains(&b))
    }

    pub(crate) fn degree(&self, id: ConnectorId) -> usize {
        self.inner
            .read()
            .adjacency
            .get(&id)
            .map_or(0, BTreeSet::len)
    }
}
