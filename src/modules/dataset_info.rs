//! DatasetInfo: accepts any dataset and reports its concrete type.

use crate::dataset::DATASET;
use crate::error::{KernelError, Result};
use crate::kernel::connector::{Connector, InputConnector};
use crate::kernel::id::ConnectorId;
use crate::kernel::module::{ConnectorBuilder, ModuleContext, ModuleLogic};
use crate::kernel::property::{Properties, Property, PropertyValue};
use std::sync::Arc;

pub const NAME: &str = "Dataset Info";

#[derive(Default)]
pub struct DatasetInfo {
    input: Option<InputConnector>,
    data_type: Option<Arc<Property>>,
}

impl DatasetInfo {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModuleLogic for DatasetInfo {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Shows the type of whatever dataset is connected."
    }

    fn factory(&self) -> Box<dyn ModuleLogic> {
        Box::new(DatasetInfo::new())
    }

    fn connectors(&mut self, builder: &mut ConnectorBuilder) -> Result<()> {
        self.input = Some(builder.add_input_of("in", "Any dataset", &DATASET)?);
        Ok(())
    }

    fn properties(&mut self, properties: &mut Properties) -> Result<()> {
        self.data_type = Some(properties.add_info(
            "Data type",
            "Type of the connected dataset",
            PropertyValue::String(String::new()),
        )?);
        Ok(())
    }

    fn on_data_changed(&mut self, _ctx: &ModuleContext, _input: &Connector, _output: ConnectorId) -> Result<()> {
        let (Some(input), Some(data_type)) = (&self.input, &self.data_type) else {
            return Ok(());
        };
        match input.get_packet() {
            Ok(Some(packet)) => {
                data_type.set(PropertyValue::String(packet.data_type().name().to_string()))
            }
            Ok(None) | Err(KernelError::ConnectorUnconnected(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
