//! FiberDisplay: consumes a fiber bundle and reports its size.

use crate::dataset::FiberBundle;
use crate::error::{KernelError, Result};
use crate::kernel::connector::Connector;
use crate::kernel::id::ConnectorId;
use crate::kernel::module::{ConnectorBuilder, ModuleContext, ModuleLogic};
use crate::kernel::property::{Properties, Property, PropertyValue};
use crate::kernel::typed::InputData;
use std::sync::Arc;

pub const NAME: &str = "Fiber Display";

#[derive(Default)]
pub struct FiberDisplay {
    input: Option<InputData<FiberBundle>>,
    fiber_count: Option<Arc<Property>>,
}

impl FiberDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn refresh(&self) -> Result<()> {
        let (Some(input), Some(count)) = (&self.input, &self.fiber_count) else {
            return Ok(());
        };
        match input.get_data() {
            Ok(Some(bundle)) => {
                tracing::debug!(
                    "{}: {} fibers, {} points",
                    NAME,
                    bundle.fiber_count(),
                    bundle.point_count()
                );
                count.set(PropertyValue::Int(bundle.fiber_count() as i64))
            }
            Ok(None) | Err(KernelError::ConnectorUnconnected(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl ModuleLogic for FiberDisplay {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Displays fiber bundles as lines."
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(FiberDisplay::new())
    }

    fn connectors(&mut self, builder: &mut ConnectorBuilder) -> Result<()> {
        self.input = Some(builder.add_input("fibers", "The fibers to show")?);
        Ok(())
    }

    fn properties(&mut self, properties: &mut Properties) -> Result<()> {
        properties.add_double("Line width", "Width of the fiber lines", 1.0)?;
        self.fiber_count = Some(properties.add_info(
            "Fiber count",
            "Number of fibers shown",
            PropertyValue::Int(0),
        )?);
        Ok(())
    }

    fn on_connection_established(&mut self, _ctx: &ModuleContext, here: &Connector, _there: ConnectorId) {
        if let Err(e) = self.refresh() {
            tracing::warn!("{} \"{}\": {}", NAME, here.name(), e);
        }
    }

    fn on_data_changed(&mut self, _ctx: &ModuleContext, _input: &Connector, _output: ConnectorId) -> Result<()> {
        self.refresh()
    }
}
