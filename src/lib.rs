//! # modkernel: threaded module/dataflow kernel
//!
//! Processing modules expose named, typed connectors and are wired into a
//! directed graph. Each module runs on its own thread; a change published on
//! an output is delivered as an event to every connected input's module.
//!
//! ## Architecture
//!
//! - **Kernel**: connectors, modules, containers, the prototype factory and
//!   combiners that build graphs programmatically or from project files
//! - **Modules**: a handful of built-in module kinds registered as prototypes
//! - **Dataset**: payload types carried between modules and their type tags
//! - **Communication**: crossbeam channels carry events into module inboxes
//!
//! ## Configuration
//!
//! Binary settings are read from `config.toml` in the platform config
//! directory under `dev.hxyulin.modkernel` (see [`config`]).
//!
//! ## Example
//!
//! ```ignore
//! use modkernel::kernel::{ModuleCombiner, ModuleContainer, ModuleFactory, ProjectFileCombiner};
//!
//! let factory = ModuleFactory::global();
//! factory.load();
//!
//! let root = ModuleContainer::new("root");
//! let mut project = ProjectFileCombiner::from_path(factory, "brain.owproj")?;
//! let report = project.apply(&root);
//! println!("{}", report);
//!
//! root.stop();
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod kernel;
pub mod modules;

pub use error::{KernelError, Result};
pub use kernel::{
    ApplyReport, Connector, DataType, InputData, Module, ModuleCombiner, ModuleContainer,
    ModuleFactory, ModuleLogic, OutputData, ProjectFileCombiner, Transferable,
};
