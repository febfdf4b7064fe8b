//! ApplyPrototypeCombiner: create a module from a prototype, add it to a
//! container and optionally connect it to an existing source module.

use crate::error::KernelError;
use crate::kernel::combiner::ModuleCombiner;
use crate::kernel::container::ModuleContainer;
use crate::kernel::factory::ModuleFactory;
use crate::kernel::module::{Module, ModuleState};
use std::fmt;
use std::sync::Arc;

/// What an [`ApplyPrototypeCombiner`] achieved.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// The new module was added; no connection was requested.
    Added(Arc<Module>),
    /// The new module was added and connected to the source.
    Connected(Arc<Module>),
    /// The new module was added but the connection failed.
    ConnectFailed { module: Arc<Module>, reason: String },
    /// The source or the new module crashed before getting ready.
    Crashed { module: String, reason: String },
    /// Nothing was added.
    Failed(KernelError),
}

impl ApplyOutcome {
    /// The created module, if it made it into the container.
    pub fn module(&self) -> Option<&Arc<Module>> {
        match self {
            ApplyOutcome::Added(m)
            | ApplyOutcome::Connected(m)
            | ApplyOutcome::ConnectFailed { module: m, .. } => Some(m),
            ApplyOutcome::Crashed { .. } | ApplyOutcome::Failed(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApplyOutcome::Added(_) | ApplyOutcome::Connected(_))
    }
}

pub struct ApplyPrototypeCombiner {
    factory: Arc<ModuleFactory>,
    source: Option<Arc<Module>>,
    source_output: String,
    prototype: Arc<Module>,
    target_input: String,
}

impl ApplyPrototypeCombiner {
    /// Only create and add the prototype.
    pub fn new(factory: Arc<ModuleFactory>, prototype: Arc<Module>) -> Self {
        Self {
            factory,
            source: None,
            source_output: String::new(),
            prototype,
            target_input: String::new(),
        }
    }

    /// Create the prototype and connect its `target_input` to
    /// `source_output` of `source`.
    pub fn with_connection(
        factory: Arc<ModuleFactory>,
        source: Arc<Module>,
        source_output: &str,
        prototype: Arc<Module>,
        target_input: &str,
    ) -> Self {
        Self {
            factory,
            source: Some(source),
            source_output: source_output.to_string(),
            prototype,
            target_input: target_input.to_string(),
        }
    }

    pub fn source(&self) -> Option<&Arc<Module>> {
        self.source.as_ref()
    }

    pub fn source_output(&self) -> &str {
        &self.source_output
    }

    pub fn prototype(&self) -> &Arc<Module> {
        &self.prototype
    }

    pub fn target_input(&self) -> &str {
        &self.target_input
    }
}

impl ModuleCombiner for ApplyPrototypeCombiner {
    type Outcome = ApplyOutcome;

    fn apply(&mut self, container: &Arc<ModuleContainer>) -> ApplyOutcome {
        if let Some(source) = &self.source {
            // A removed source is Stopped and keeps no connections.
            let stopped = source.state() == ModuleState::Stopped && !source.is_crashed();
            if stopped || (!source.is_ready_or_crashed() && !source.is_running()) {
                let err = KernelError::ConnectionFailed(format!(
                    "source module \"{}\" is not running",
                    source.name()
                ));
                tracing::error!("{}", err);
                return ApplyOutcome::Failed(err);
            }
        }

        let target = match self.factory.create(&self.prototype) {
            Ok(module) => module,
            Err(e) => {
                tracing::error!("Could not create \"{}\": {}", self.prototype.name(), e);
                return ApplyOutcome::Failed(e);
            }
        };
        if let Err(e) = container.add(&target) {
            tracing::error!("Could not add \"{}\": {}", target.name(), e);
            return ApplyOutcome::Failed(e);
        }

        if let Some(source) = &self.source {
            source.wait_ready_or_crashed();
        }
        target.wait_ready_or_crashed();

        for module in self.source.iter().chain(std::iter::once(&target)) {
            if let Some(reason) = module.crash_reason() {
                tracing::warn!(
                    "Module \"{}\" crashed, not connecting: {}",
                    module.name(),
                    reason
                );
                return ApplyOutcome::Crashed {
                    module: module.name().to_string(),
                    reason,
                };
            }
        }

        let Some(source) = &self.source else {
            return ApplyOutcome::Added(target);
        };
        if self.target_input.is_empty() || self.source_output.is_empty() {
            return ApplyOutcome::Added(target);
        }

        let connected = source
            .get_output_connector(&self.source_output)
            .and_then(|output| {
                target
                    .get_input_connector(&self.target_input)
                    .and_then(|input| input.connect(&output))
            });

        match connected {
            Ok(()) => ApplyOutcome::Connected(target),
            Err(e) => {
                tracing::warn!("{}: connection failed: {}", self, e);
                ApplyOutcome::ConnectFailed {
                    module: target,
                    reason: e.to_string(),
                }
            }
        }
    }
}

impl fmt::Display for ApplyPrototypeCombiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) if !self.target_input.is_empty() => write!(
                f,
                "{}:{} -> {}:{}",
                source.name(),
                self.source_output,
                self.prototype.name(),
                self.target_input
            ),
            _ => write!(f, "add {}", self.prototype.name()),
        }
    }
}

impl fmt::Debug for ApplyPrototypeCombiner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApplyPrototypeCombiner({})", self)
    }
}
