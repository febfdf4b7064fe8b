//! Messages flowing into module inboxes and out of containers.

use crate::kernel::id::{ConnectorId, ModuleId};
use serde::Serialize;

/// Events posted to a module's inbox. Drained on the module's own thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleEvent {
    /// A connector of this module gained a peer.
    ConnectionEstablished { here: ConnectorId, there: ConnectorId },

    /// A connector of this module lost a peer.
    ConnectionClosed { here: ConnectorId, there: ConnectorId },

    /// The output feeding `input` published new data.
    DataChanged {
        input: ConnectorId,
        output: ConnectorId,
    },

    /// A property value was changed from outside or inside the module.
    PropertyChanged { name: String },

    /// Wake-up sent by `request_stop`.
    Stop,
}

/// Notifications a container sends to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContainerEvent {
    /// The module joined the container and is about to start.
    Associated { module: ModuleId, name: String },

    /// The module signalled that it is ready.
    Ready { module: ModuleId, name: String },

    /// The module's thread failed.
    Crashed {
        module: ModuleId,
        name: String,
        reason: String,
    },

    /// The module was stopped and left the container.
    Removed { module: ModuleId, name: String },
}

impl ContainerEvent {
    pub fn module(&self) -> ModuleId {
        match self {
            ContainerEvent::Associated { module, .. }
            | ContainerEvent::Ready { module, .. }
            | ContainerEvent::Crashed { module, .. }
            | ContainerEvent::Removed { module, .. } => *module,
        }
    }
}
