//! The module kernel.
//!
//! Modules expose typed connectors, run on their own threads and are wired
//! into a live graph:
//!
//! - **Connectors** ([`connector`], [`typed`]): named endpoints. Edges are kept
//!   in one process-wide table ([`wiring`]) so both sides always agree.
//! - **Modules** ([`module`]): a [`ModuleLogic`] per kind inside a shared
//!   [`Module`] shell that owns the thread, lifecycle and inbox.
//! - **Containers** ([`container`]): own and start/stop modules.
//! - **Factory** ([`factory`]): the prototype registry.
//! - **Combiners** ([`combiner`]): programmatic and file-driven graph building.
//!
//! Cross-thread notification is message passing: connectors post
//! [`ModuleEvent`]s into the owning module's inbox, which the module drains
//! on its own thread.

pub mod combiner;
pub mod connector;
pub mod container;
pub mod data_type;
pub mod event;
pub mod factory;
pub mod id;
pub mod module;
pub mod property;
pub mod typed;
mod wiring;

#[cfg(test)]
pub(crate) mod testing;

pub use combiner::{
    ApplyOutcome, ApplyPrototypeCombiner, ApplyReport, CompatiblesGroup, DisconnectCombiner,
    ModuleCombiner, ProjectFileCombiner,
};
pub use connector::{Connector, Direction, InputConnector, OutputConnector};
pub use container::ModuleContainer;
pub use data_type::{DataType, Packet, Transferable};
pub use event::{ContainerEvent, ModuleEvent};
pub use factory::ModuleFactory;
pub use id::{ConnectorId, ModuleId};
pub use module::{
    ConnectorBuilder, Module, ModuleContext, ModuleLogic, ModuleState, ModuleType, Requirement,
};
pub use property::{Properties, Property, PropertyPurpose, PropertyValue};
pub use typed::{InputData, OutputData};
