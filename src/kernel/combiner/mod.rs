//! Combiners build or tear down parts of a module graph.
//!
//! - [`ApplyPrototypeCombiner`]: instantiate one prototype and optionally wire
//!   it to an existing module.
//! - [`ProjectFileCombiner`]: build a whole graph from a declarative file.
//! - [`DisconnectCombiner`]: remove one edge.

pub mod apply;
pub mod disconnect;
pub mod project_file;
pub mod report;

pub use apply::{ApplyOutcome, ApplyPrototypeCombiner};
pub use disconnect::DisconnectCombiner;
pub use project_file::{save_project, write_project, ProjectFileCombiner, PROJECT_FILE_EXTENSION};
pub use report::{ApplyReport, DeclarationKind, Outcome, ReportEntry, SkipReason};

use crate::kernel::container::ModuleContainer;
use crate::kernel::module::Module;
use std::sync::Arc;

/// Something that changes the module graph inside a container.
pub trait ModuleCombiner {
    type Outcome;

    /// Apply the change to `container`. Failures are logged and reported
    /// through the outcome rather than returned as errors.
    fn apply(&mut self, container: &Arc<ModuleContainer>) -> Self::Outcome;
}

/// All ways of attaching one prototype.
#[derive(Debug)]
pub struct CompatiblesGroup {
    pub prototype: Arc<Module>,
    pub combiners: Vec<ApplyPrototypeCombiner>,
}
