//! Module properties.
//!
//! Every module owns one [`Properties`] group, filled during initialization
//! and frozen afterwards. Values stay mutable through their own lock; each
//! successful change posts [`ModuleEvent::PropertyChanged`] to the owner.

use crate::error::{KernelError, Result};
use crate::kernel::event::ModuleEvent;
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// The value held by a property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl PropertyValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Double(_) => "double",
            PropertyValue::String(_) => "string",
        }
    }

    /// Parse `text` into a value of the same kind as `self`.
    pub fn parse_same_kind(&self, text: &str) -> Option<PropertyValue> {
        let trimmed = text.trim();
        match self {
            PropertyValue::Bool(_) => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(PropertyValue::Bool(true)),
                "false" | "0" => Some(PropertyValue::Bool(false)),
                _ => None,
            },
            PropertyValue::Int(_) => trimmed.parse().ok().map(PropertyValue::Int),
            PropertyValue::Double(_) => trimmed.parse().ok().map(PropertyValue::Double),
            PropertyValue::String(_) => Some(PropertyValue::String(text.to_string())),
        }
    }

    fn same_kind(&self, other: &PropertyValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::String(v) => f.write_str(v),
        }
    }
}

/// Whether a property is user-settable or reports module state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyPurpose {
    Parameter,
    Information,
}

/// A single named, typed value.
pub struct Property {
    name: String,
    description: String,
    purpose: PropertyPurpose,
    default: PropertyValue,
    value: RwLock<PropertyValue>,
    notify: Option<Sender<ModuleEvent>>,
}

impl Property {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn purpose(&self) -> PropertyPurpose {
        self.purpose
    }

    pub fn get(&self) -> PropertyValue {
        self.value.read().clone()
    }

    pub fn default_value(&self) -> &PropertyValue {
        &self.default
    }

    /// True if the current value differs from the declared default.
    pub fn is_changed(&self) -> bool {
        *self.value.read() != self.default
    }

    /// Replace the value. The new value must be of the same kind.
    pub fn set(&self, value: PropertyValue) -> Result<()> {
        if !self.default.same_kind(&value) {
            return Err(KernelError::Property(format!(
                "property \"{}\" holds a {}, not a {}",
                self.name,
                self.default.kind_name(),
                value.kind_name()
            )));
        }
        *self.value.write() = value;
        if let Some(tx) = &self.notify {
            // The owner may already be gone; nothing to notify then.
            let _ = tx.send(ModuleEvent::PropertyChanged {
                name: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Parse `text` according to the property's kind and store it.
    pub fn set_as_string(&self, text: &str) -> Result<()> {
        let value = self.default.parse_same_kind(text).ok_or_else(|| {
            KernelError::Property(format!(
                "cannot parse \"{}\" as {} for property \"{}\"",
                text,
                self.default.kind_name(),
                self.name
            ))
        })?;
        self.set(value)
    }

    pub fn as_string(&self) -> String {
        self.value.read().to_string()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self.value.read() {
            PropertyValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self.value.read() {
            PropertyValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match *self.value.read() {
            PropertyValue::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value", &*self.value.read())
            .finish()
    }
}

/// The property group of one module.
#[derive(Debug, Default)]
pub struct Properties {
    entries: Vec<Arc<Property>>,
    notify: Option<Sender<ModuleEvent>>,
}

impl Properties {
    /// A group whose changes are posted to `notify`.
    pub fn new(notify: Option<Sender<ModuleEvent>>) -> Self {
        Self {
            entries: Vec::new(),
            notify,
        }
    }

    pub fn add_bool(&mut self, name: &str, description: &str, default: bool) -> Result<Arc<Property>> {
        self.add(name, description, PropertyPurpose::Parameter, PropertyValue::Bool(default))
    }

    pub fn add_int(&mut self, name: &str, description: &str, default: i64) -> Result<Arc<Property>> {
        self.add(name, description, PropertyPurpose::Parameter, PropertyValue::Int(default))
    }

    pub fn add_double(&mut self, name: &str, description: &str, default: f64) -> Result<Arc<Property>> {
        self.add(name, description, PropertyPurpose::Parameter, PropertyValue::Double(default))
    }

    pub fn add_string(&mut self, name: &str, description: &str, default: &str) -> Result<Arc<Property>> {
        self.add(
            name,
            description,
            PropertyPurpose::Parameter,
            PropertyValue::String(default.to_string()),
        )
    }

    /// A read-mostly property the module uses to report state.
    pub fn add_info(&mut self, name: &str, description: &str, default: PropertyValue) -> Result<Arc<Property>> {
        self.add(name, description, PropertyPurpose::Information, default)
    }

    fn add(
        &mut self,
        name: &str,
        description: &str,
        purpose: PropertyPurpose,
        default: PropertyValue,
    ) -> Result<Arc<Property>> {
        if self.find(name).is_some() {
            return Err(KernelError::NameNotUnique(format!("property \"{}\"", name)));
        }
        let property = Arc::new(Property {
            name: name.to_string(),
            description: description.to_string(),
            purpose,
            value: RwLock::new(default.clone()),
            default,
            notify: self.notify.clone(),
        });
        self.entries.push(Arc::clone(&property));
        Ok(property)
    }

    pub fn find(&self, name: &str) -> Option<Arc<Property>> {
        self.entries.iter().find(|p| p.name == name).cloned()
    }

    pub fn get(&self, name: &str) -> Result<Arc<Property>> {
        self.find(name)
            .ok_or_else(|| KernelError::Property(format!("no property named \"{}\"", name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Property>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
