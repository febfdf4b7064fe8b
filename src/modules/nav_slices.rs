//! NavSlices: axis-aligned slice positions through a scalar field.
//!
//! Tracks the extent of the connected field and keeps the three slice
//! positions inside it.

use crate::dataset::ScalarField;
use crate::error::{KernelError, Result};
use crate::kernel::connector::Connector;
use crate::kernel::id::ConnectorId;
use crate::kernel::module::{ConnectorBuilder, ModuleContext, ModuleLogic};
use crate::kernel::property::{Properties, Property, PropertyValue};
use crate::kernel::typed::InputData;
use std::sync::Arc;

pub const NAME: &str = "Navigation Slices";

#[derive(Default)]
pub struct NavSlices {
    input: Option<InputData<ScalarField>>,
    /// (slice position, axis index into dims)
    slices: Vec<(Arc<Property>, usize)>,
    extent: Option<Arc<Property>>,
}

impl NavSlices {
    pub fn new() -> Self {
        Self::default()
    }

    fn refresh(&self) -> Result<()> {
        let Some(input) = &self.input else {
            return Ok(());
        };
        let field = match input.get_data() {
            Ok(Some(field)) => field,
            // Nothing published yet, or the output went away meanwhile.
            Ok(None) | Err(KernelError::ConnectorUnconnected(_)) => return Ok(()),
            Err(e) => return Err(e),
        };
        let dims = field.dims();
        if let Some(extent) = &self.extent {
            extent.set(PropertyValue::String(format!(
                "{}x{}x{}",
                dims[0], dims[1], dims[2]
            )))?;
        }
        for (slice, axis) in &self.slices {
            let max = dims[*axis].saturating_sub(1) as i64;
            let pos = slice.as_int().unwrap_or(0);
            if pos > max {
                tracing::debug!(
                    "{}: clamping \"{}\" from {} to {}",
                    NAME,
                    slice.name(),
                    pos,
                    max
                );
                slice.set(PropertyValue::Int(max))?;
            }
        }
        Ok(())
    }
}

impl ModuleLogic for NavSlices {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Axial, coronal and sagittal slice positions."
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(NavSlices::new())
    }

    fn connectors(&mut self, builder: &mut ConnectorBuilder) -> Result<()> {
        self.input = Some(builder.add_input("in", "The field to slice")?);
        Ok(())
    }

    fn properties(&mut self, properties: &mut Properties) -> Result<()> {
        properties.add_bool("showAxial", "Show the axial slice", true)?;
        properties.add_bool("showCoronal", "Show the coronal slice", true)?;
        properties.add_bool("showSagittal", "Show the sagittal slice", true)?;
        self.slices = vec![
            (properties.add_int("Axial Slice", "Position along z", 80)?, 2),
            (properties.add_int("Coronal Slice", "Position along y", 100)?, 1),
            (properties.add_int("Sagittal Slice", "Position along x", 80)?, 0),
        ];
        properties.add_bool("Show complete", "Show slices across the whole volume", false)?;
        self.extent = Some(properties.add_info(
            "Extent",
            "Grid size of the connected field",
            PropertyValue::String(String::new()),
        )?);
        Ok(())
    }

    fn on_connection_established(&mut self, _ctx: &ModuleContext, here: &Connector, _there: ConnectorId) {
        // The output may have published before we were connected.
        if let Err(e) = self.refresh() {
            tracing::warn!("{} \"{}\": {}", NAME, here.name(), e);
        }
    }

    fn on_data_changed(&mut self, _ctx: &ModuleContext, _input: &Connector, _output: ConnectorId) -> Result<()> {
        self.refresh()
    }
}
