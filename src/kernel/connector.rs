//! Connectors: the named, typed endpoints of a module.
//!
//! A [`Connector`] is a cheap handle onto shared connector state. Its owning
//! module is fixed at construction. Peer sets are not stored on the connector
//! itself but in the process-wide connection table, which keeps both sides of
//! every edge consistent.
//!
//! [`InputConnector`] and [`OutputConnector`] refine the direction. An input
//! accepts at most one output; an output may feed any number of inputs.

use crate::error::{KernelError, Result};
use crate::kernel::data_type::{DataType, Packet};
use crate::kernel::event::ModuleEvent;
use crate::kernel::id::{ConnectorId, ModuleId};
use crate::kernel::module::Module;
use crate::kernel::wiring::{Link, CONNECTIONS};
use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Whether a connector consumes or produces data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

pub(crate) struct ConnectorInner {
    id: ConnectorId,
    name: String,
    description: String,
    direction: Direction,
    /// Produced type for outputs, required type for inputs.
    data_type: &'static DataType,
    module_id: ModuleId,
    module_name: String,
    owner: Weak<Module>,
    /// Published payload. Only written on outputs.
    payload: ArcSwapOption<Packet>,
    /// Set when the feeding output publishes, cleared on read. Inputs only.
    updated: AtomicBool,
}

impl ConnectorInner {
    fn post(&self, event: ModuleEvent) -> bool {
        match self.owner.upgrade() {
            Some(module) => {
                module.post(event);
                true
            }
            None => false,
        }
    }

    fn canonical_name(&self) -> String {
        format!("{}:{}", self.module_name, self.name)
    }
}

impl Drop for ConnectorInner {
    fn drop(&mut self) {
        let peers = CONNECTIONS.detach(self.id);
        for (peer_id, weak) in peers {
            if let Some(peer) = weak.upgrade() {
                peer.post(ModuleEvent::ConnectionClosed {
                    here: peer_id,
                    there: self.id,
                });
            }
        }
    }
}

/// Handle onto a connector of some module.
#[derive(Clone)]
pub struct Connector {
    inner: Arc<ConnectorInner>,
}

impl Connector {
    pub(crate) fn new(
        name: &str,
        description: &str,
        direction: Direction,
        data_type: &'static DataType,
        owner: &Module,
    ) -> Self {
        let inner = Arc::new(ConnectorInner {
            id: ConnectorId::next(),
            name: name.to_string(),
            description: description.to_string(),
            direction,
            data_type,
            module_id: owner.id(),
            module_name: owner.name().to_string(),
            owner: owner.weak_self(),
            payload: ArcSwapOption::empty(),
            updated: AtomicBool::new(false),
        });
        CONNECTIONS.register(inner.id, Arc::downgrade(&inner));
        Self { inner }
    }

    fn from_inner(inner: Arc<ConnectorInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> ConnectorId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    pub fn data_type(&self) -> &'static DataType {
        self.inner.data_type
    }

    pub fn module_id(&self) -> ModuleId {
        self.inner.module_id
    }

    pub fn module_name(&self) -> &str {
        &self.inner.module_name
    }

    /// `<module>:<connector>`
    pub fn canonical_name(&self) -> String {
        self.inner.canonical_name()
    }

    /// The owning module, if it still exists.
    pub fn module(&self) -> Option<Arc<Module>> {
        self.inner.owner.upgrade()
    }

    pub fn is_input(&self) -> bool {
        self.inner.direction == Direction::Input
    }

    pub fn is_output(&self) -> bool {
        self.inner.direction == Direction::Output
    }

    pub fn as_input(&self) -> Option<InputConnector> {
        self.is_input().then(|| InputConnector(self.clone()))
    }

    pub fn as_output(&self) -> Option<OutputConnector> {
        self.is_output().then(|| OutputConnector(self.clone()))
    }

    /// Whether this side would accept `peer`. Connecting requires both
    /// sides to accept each other.
    pub fn connectable(&self, peer: &Connector) -> bool {
        match (self.direction(), peer.direction()) {
            (Direction::Input, Direction::Output) => peer.data_type().is_a(self.data_type()),
            (Direction::Output, Direction::Input) => self.data_type().is_a(peer.data_type()),
            _ => false,
        }
    }

    /// Connect to `peer`. Repeating an existing connection is a no-op.
    ///
    /// Both owning modules receive [`ModuleEvent::ConnectionEstablished`]
    /// before this returns.
    pub fn connect(&self, peer: &Connector) -> Result<()> {
        if !(self.connectable(peer) && peer.connectable(self)) {
            return Err(KernelError::ConnectorsIncompatible {
                from: self.describe(),
                to: peer.describe(),
            });
        }

        for side in [self, peer] {
            match side.module() {
                None => {
                    return Err(KernelError::ConnectionFailed(format!(
                        "owner of {} no longer exists",
                        side.canonical_name()
                    )))
                }
                Some(module) if module.is_prototype() => {
                    return Err(KernelError::IsPrototype(module.name().to_string()))
                }
                Some(_) => {}
            }
        }

        let (input, output) = if self.is_input() {
            (self, peer)
        } else {
            (peer, self)
        };

        match CONNECTIONS.link(input.id(), output.id()) {
            Link::AlreadyLinked => {
                tracing::debug!(
                    "{} and {} are already connected",
                    self.canonical_name(),
                    peer.canonical_name()
                );
                return Ok(());
            }
            Link::InputOccupied => {
                return Err(KernelError::ConnectionFailed(format!(
                    "Input connector {} already connected. Disconnect it first.",
                    input.canonical_name()
                )));
            }
            Link::Created => {}
        }

        self.inner.post(ModuleEvent::ConnectionEstablished {
            here: self.id(),
            there: peer.id(),
        });
        peer.inner.post(ModuleEvent::ConnectionEstablished {
            here: peer.id(),
            there: self.id(),
        });

        tracing::debug!(
            "Connected {} -> {}",
            output.canonical_name(),
            input.canonical_name()
        );
        Ok(())
    }

    /// Remove the connection to `peer`, if any.
    ///
    /// The edge is always removed. Fails with `DisconnectFailed` when one
    /// side's owner could not be notified because it no longer exists.
    pub fn disconnect(&self, peer: &Connector) -> Result<()> {
        if !CONNECTIONS.unlink(self.id(), peer.id()) {
            tracing::debug!(
                "Disconnect requested for {} and {}, which are not connected",
                self.canonical_name(),
                peer.canonical_name()
            );
            return Ok(());
        }

        let here_notified = self.inner.post(ModuleEvent::ConnectionClosed {
            here: self.id(),
            there: peer.id(),
        });
        let there_notified = peer.inner.post(ModuleEvent::ConnectionClosed {
            here: peer.id(),
            there: self.id(),
        });

        tracing::debug!(
            "Disconnected {} and {}",
            self.canonical_name(),
            peer.canonical_name()
        );

        if here_notified && there_notified {
            Ok(())
        } else {
            Err(KernelError::DisconnectFailed(format!(
                "edge {} - {} removed, but an owning module no longer exists",
                self.canonical_name(),
                peer.canonical_name()
            )))
        }
    }

    /// Remove every connection of this connector under one lock.
    pub fn disconnect_all(&self) {
        let former = CONNECTIONS.unlink_all(self.id());
        for (peer_id, weak) in former {
            if let Some(peer) = weak.upgrade() {
                peer.post(ModuleEvent::ConnectionClosed {
                    here: peer_id,
                    there: self.id(),
                });
            }
            self.inner.post(ModuleEvent::ConnectionClosed {
                here: self.id(),
                there: peer_id,
            });
        }
    }

    pub fn is_connected_to(&self, peer: &Connector) -> bool {
        CONNECTIONS.is_linked(self.id(), peer.id())
    }

    pub fn is_connected(&self) -> bool {
        self.connection_count() > 0
    }

    pub fn connection_count(&self) -> usize {
        CONNECTIONS.degree(self.id())
    }

    /// Snapshot of the current peers.
    pub fn peers(&self) -> Vec<Connector> {
        CONNECTIONS
            .peers(self.id())
            .into_iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .map(Connector::from_inner)
            .collect()
    }

    pub fn ptr_eq(&self, other: &Connector) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn describe(&self) -> String {
        format!(
            "{} ({} of {})",
            self.canonical_name(),
            self.direction(),
            self.data_type()
        )
    }
}

impl PartialEq for Connector {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Connector {}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("id", &self.id())
            .field("name", &self.canonical_name())
            .field("direction", &self.direction())
            .field("data_type", &self.data_type().name())
            .finish()
    }
}

/// A connector that consumes data.
#[derive(Clone, PartialEq, Eq)]
pub struct InputConnector(Connector);

impl InputConnector {
    /// The output currently feeding this input.
    pub fn source(&self) -> Option<OutputConnector> {
        self.0.peers().into_iter().next().and_then(|c| c.as_output())
    }

    /// The payload published by the feeding output, untyped.
    ///
    /// `Ok(None)` if connected but nothing was published yet.
    pub fn get_packet(&self) -> Result<Option<Packet>> {
        let source = self
            .source()
            .ok_or_else(|| KernelError::ConnectorUnconnected(self.canonical_name()))?;
        self.0.inner.updated.store(false, Ordering::Release);
        Ok(source.packet())
    }

    /// True if new data arrived since the last read.
    pub fn updated(&self) -> bool {
        self.0.inner.updated.load(Ordering::Acquire)
    }

    pub fn as_connector(&self) -> &Connector {
        &self.0
    }
}

impl Deref for InputConnector {
    type Target = Connector;

    fn deref(&self) -> &Connector {
        &self.0
    }
}

impl fmt::Debug for InputConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// A connector that produces data.
#[derive(Clone, PartialEq, Eq)]
pub struct OutputConnector(Connector);

impl OutputConnector {
    /// Replace the published payload, then post exactly one
    /// `DataChanged` to the owner of every connected input.
    pub fn publish(&self, packet: Packet) {
        self.0.inner.payload.store(Some(Arc::new(packet)));
        for (input_id, weak) in CONNECTIONS.peers(self.id()) {
            if let Some(input) = weak.upgrade() {
                input.updated.store(true, Ordering::Release);
                input.post(ModuleEvent::DataChanged {
                    input: input_id,
                    output: self.id(),
                });
            }
        }
    }

    /// The currently published payload.
    pub fn packet(&self) -> Option<Packet> {
        self.0.inner.payload.load_full().map(|p| (*p).clone())
    }

    pub fn as_connector(&self) -> &Connector {
        &self.0
    }
}

impl Deref for OutputConnector {
    type Target = Connector;

    fn deref(&self) -> &Connector {
        &self.0
    }
}

impl fmt::Debug for OutputConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}
