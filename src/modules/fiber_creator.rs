//! FiberCreator: generates a bundle of helical fibers.

use crate::dataset::FiberBundle;
use crate::error::Result;
use crate::kernel::module::{ConnectorBuilder, ModuleContext, ModuleLogic, ModuleType};
use crate::kernel::property::{Properties, Property};
use crate::kernel::typed::OutputData;
use std::sync::Arc;

pub const NAME: &str = "Fiber Creator";

#[derive(Default)]
pub struct FiberCreator {
    output: Option<OutputData<FiberBundle>>,
    fibers: Option<Arc<Property>>,
    points: Option<Arc<Property>>,
}

impl FiberCreator {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self) {
        let (Some(output), Some(fibers), Some(points)) = (&self.output, &self.fibers, &self.points)
        else {
            return;
        };
        let count = fibers.as_int().unwrap_or(0).max(0) as usize;
        let per_fiber = points.as_int().unwrap_or(0).max(0) as usize;
        output.update_data(FiberBundle::helices(count, per_fiber));
    }
}

impl ModuleLogic for FiberCreator {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Creates a synthetic fiber bundle."
    }

    fn module_type(&self) -> ModuleType {
        ModuleType::Data
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(FiberCreator::new())
    }

    fn connectors(&mut self, builder: &mut ConnectorBuilder) -> Result<()> {
        self.output = Some(builder.add_output("out", "The created fibers")?);
        Ok(())
    }

    fn properties(&mut self, properties: &mut Properties) -> Result<()> {
        self.fibers = Some(properties.add_int("Fibers", "Number of fibers", 10)?);
        self.points = Some(properties.add_int("Points per fiber", "Samples along each fiber", 20)?);
        Ok(())
    }

    fn main(&mut self, ctx: &ModuleContext) -> Result<()> {
        self.publish();
        ctx.ready();
        while let Some(event) = ctx.wait_event() {
            self.handle_event(ctx, event)?;
        }
        Ok(())
    }

    fn on_property_changed(&mut self, _ctx: &ModuleContext, property: &Property) -> Result<()> {
        if matches!(property.name(), "Fibers" | "Points per fiber") {
            self.publish();
        }
        Ok(())
    }
}
