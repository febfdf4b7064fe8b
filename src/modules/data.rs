//! DataModule: provides a scalar field to downstream modules.
//!
//! There is no file loading; the field is generated from the `Resolution`
//! property and republished whenever that property changes.

use crate::dataset::ScalarField;
use crate::error::Result;
use crate::kernel::module::{ConnectorBuilder, ModuleContext, ModuleLogic, ModuleType};
use crate::kernel::property::{Properties, Property, PropertyValue};
use crate::kernel::typed::OutputData;
use std::sync::Arc;

pub const NAME: &str = "Data Module";

/// Largest accepted resolution per axis.
const MAX_RESOLUTION: i64 = 256;

#[derive(Default)]
pub struct DataModule {
    output: Option<OutputData<ScalarField>>,
    filename: Option<Arc<Property>>,
    resolution: Option<Arc<Property>>,
}

impl DataModule {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self) -> Result<()> {
        let (Some(output), Some(resolution)) = (&self.output, &self.resolution) else {
            return Ok(());
        };
        let n = resolution.as_int().unwrap_or(0);
        if !(1..=MAX_RESOLUTION).contains(&n) {
            tracing::warn!(
                "{}: resolution {} out of range 1..={}, keeping previous data",
                NAME,
                n,
                MAX_RESOLUTION
            );
            return Ok(());
        }
        let field = ScalarField::synthetic(n as usize);
        if let Some(filename) = &self.filename {
            filename.set(PropertyValue::String(format!("synthetic:{}x{}x{}", n, n, n)))?;
        }
        tracing::debug!("{}: publishing {} samples", NAME, field.len());
        output.update_data(field);
        Ok(())
    }
}

impl ModuleLogic for DataModule {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Provides a scalar field on its output."
    }

    fn module_type(&self) -> ModuleType {
        ModuleType::Data
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(DataModule::new())
    }

    fn connectors(&mut self, builder: &mut ConnectorBuilder) -> Result<()> {
        self.output = Some(builder.add_output("out", "The loaded dataset")?);
        Ok(())
    }

    fn properties(&mut self, properties: &mut Properties) -> Result<()> {
        self.filename = Some(properties.add_info(
            "Filename",
            "Where the data came from",
            PropertyValue::String(String::new()),
        )?);
        self.resolution = Some(properties.add_int(
            "Resolution",
            "Samples per axis of the generated grid",
            16,
        )?);
        Ok(())
    }

    fn main(&mut self, ctx: &ModuleContext) -> Result<()> {
        if ctx.module().is_active() {
            self.publish()?;
        }
        ctx.ready();
        while let Some(event) = ctx.wait_event() {
            self.handle_event(ctx, event)?;
        }
        Ok(())
    }

    fn on_property_changed(&mut self, ctx: &ModuleContext, property: &Property) -> Result<()> {
        if property.name() == "Resolution" && ctx.module().is_active() {
            self.publish()?;
        }
        Ok(())
    }
}
