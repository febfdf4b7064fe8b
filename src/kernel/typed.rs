//! Typed views over data connectors.
//!
//! `OutputData<T>` publishes `Arc<T>` payloads; `InputData<T>` reads them back
//! as `T`. Compatibility is decided at connect time from the [`DataType`]
//! descriptors, so a typed read only fails if an input requiring a supertype
//! is read as a concrete type the output does not produce.
//!
//! [`DataType`]: crate::kernel::data_type::DataType

use crate::error::{KernelError, Result};
use crate::kernel::connector::{InputConnector, OutputConnector};
use crate::kernel::data_type::{Packet, Transferable};
use std::marker::PhantomData;
use std::sync::Arc;

/// Input side of a typed data connector.
pub struct InputData<T> {
    connector: InputConnector,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Transferable> InputData<T> {
    pub(crate) fn new(connector: InputConnector) -> Self {
        Self {
            connector,
            _marker: PhantomData,
        }
    }

    pub fn connector(&self) -> &InputConnector {
        &self.connector
    }

    /// The payload of the connected output.
    ///
    /// Fails with `ConnectorUnconnected` if no output is connected. Returns
    /// `Ok(None)` if the output has not published anything yet.
    pub fn get_data(&self) -> Result<Option<Arc<T>>> {
        match self.connector.get_packet()? {
            None => Ok(None),
            Some(packet) => packet.downcast::<T>().map(Some).ok_or_else(|| {
                KernelError::PayloadMismatch {
                    connector: self.connector.canonical_name(),
                    expected: T::data_type().name(),
                    found: packet.data_type().name(),
                }
            }),
        }
    }

    pub fn updated(&self) -> bool {
        self.connector.updated()
    }
}

impl<T> Clone for InputData<T> {
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for InputData<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InputData").field(&self.connector).finish()
    }
}

/// Output side of a typed data connector.
pub struct OutputData<T> {
    connector: OutputConnector,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Transferable> OutputData<T> {
    pub(crate) fn new(connector: OutputConnector) -> Self {
        Self {
            connector,
            _marker: PhantomData,
        }
    }

    pub fn connector(&self) -> &OutputConnector {
        &self.connector
    }

    /// Publish a new payload and notify every connected input once.
    pub fn update_data(&self, data: impl Into<Arc<T>>) {
        self.connector.publish(Packet::new(data.into()));
    }

    /// The payload published last, if any.
    pub fn get_data(&self) -> Option<Arc<T>> {
        self.connector.packet().and_then(|p| p.downcast::<T>())
    }
}

impl<T> Clone for OutputData<T> {
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for OutputData<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("OutputData").field(&self.connector).finish()
    }
}
