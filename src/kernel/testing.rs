//! Minimal module kinds shared by the kernel's unit tests.

use crate::dataset::ScalarField;
use crate::error::Result;
use crate::kernel::connector::Connector;
use crate::kernel::id::ConnectorId;
use crate::kernel::module::{ConnectorBuilder, ModuleContext, ModuleLogic, Requirement};
use crate::kernel::typed::{InputData, OutputData};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct Source {
    pub out: Option<OutputData<ScalarField>>,
}

impl ModuleLogic for Source {
    fn name(&self) -> &str {
        "Source"
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(Source::default())
    }

    fn connectors(&mut self, builder: &mut ConnectorBuilder) -> Result<()> {
        self.out = Some(builder.add_output("out", "test output")?);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct Sink {
    pub input: Option<InputData<ScalarField>>,
    pub data_changed: Arc<AtomicUsize>,
    requirement: Option<Box<dyn Requirement>>,
}

impl Sink {
    pub fn with_requirement(requirement: Box<dyn Requirement>) -> Self {
        Self {
            requirement: Some(requirement),
            ..Self::default()
        }
    }
}

impl ModuleLogic for Sink {
    fn name(&self) -> &str {
        "Sink"
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(Sink::default())
    }

    fn requirements(&mut self) -> Vec<Box<dyn Requirement>> {
        self.requirement.take().into_iter().collect()
    }

    fn connectors(&mut self, builder: &mut ConnectorBuilder) -> Result<()> {
        self.input = Some(builder.add_input("in", "test input")?);
        Ok(())
    }

    fn on_data_changed(&mut self, _ctx: &ModuleContext, _input: &Connector, _output: ConnectorId) -> Result<()> {
        self.data_changed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
