//! Error handling for the module kernel
//!
//! This module defines the kernel error type and a Result alias for use
//! throughout the crate.

use thiserror::Error;

/// Main error type for kernel operations
#[derive(Error, Debug)]
pub enum KernelError {
    /// Two connectors cannot be wired (same direction or incompatible data types)
    #[error("Connectors incompatible: {from} and {to}")]
    ConnectorsIncompatible { from: String, to: String },

    /// A connection could not be established between compatible connectors
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An edge was removed but one side could not be notified
    #[error("Disconnect failed: {0}")]
    DisconnectFailed(String),

    /// Data was requested from an input that has no peer
    #[error("Connector {0} is not connected")]
    ConnectorUnconnected(String),

    /// The published payload is not of the requested concrete type
    #[error("Payload mismatch on {connector}: expected {expected}, found {found}")]
    PayloadMismatch {
        connector: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Connector lookup by name failed
    #[error("Connector \"{name}\" not found in module \"{module}\"")]
    ConnectorNotFound { module: String, name: String },

    /// The module has not completed initialization
    #[error("Module \"{0}\" is not initialized")]
    Uninitialized(String),

    /// Prototypes may not be run, added or connected
    #[error("Module \"{0}\" is a prototype")]
    IsPrototype(String),

    /// Connector setup ran twice or failed
    #[error("Connector initialization failed: {0}")]
    ConnectorInitFailed(String),

    /// A name that must be unique within its scope was used twice
    #[error("Name not unique: {0}")]
    NameNotUnique(String),

    /// No registered prototype matches
    #[error("Unknown prototype: {0}")]
    PrototypeUnknown(String),

    /// A prototype with the same name is already registered
    #[error("Prototype not unique: {0}")]
    PrototypeNotUnique(String),

    /// A module requirement was not satisfied at startup
    #[error("Requirement not met: {0}")]
    RequirementNotMet(String),

    /// Property lookup or conversion failed
    #[error("Property error: {0}")]
    Property(String),

    /// A module's main loop reported a failure
    #[error("Module \"{module}\" failed: {message}")]
    ModuleFailed { module: String, message: String },

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<KernelError>,
    },
}

impl KernelError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        KernelError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root(&self) -> &KernelError {
        match self {
            KernelError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for kernel operations
pub type Result<T> = std::result::Result<T, KernelError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| KernelError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| KernelError::Io(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KernelError::PrototypeUnknown("Volume Renderer".to_string());
        assert_eq!(err.to_string(), "Unknown prototype: Volume Renderer");
    }

    #[test]
    fn test_error_with_context() {
        let err = KernelError::ConnectionFailed("test".to_string());
        let with_ctx = err.with_context("Failed to wire graph");
        assert!(with_ctx.to_string().contains("Failed to wire graph"));
        assert!(matches!(with_ctx.root(), KernelError::ConnectionFailed(_)));
    }

    #[test]
    fn test_connector_not_found_error() {
        let err = KernelError::ConnectorNotFound {
            module: "Data Module".to_string(),
            name: "in".to_string(),
        };
        assert!(err.to_string().contains("\"in\""));
        assert!(err.to_string().contains("Data Module"));
    }

    #[test]
    fn test_io_context() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = res.context("Reading project").unwrap_err();
        assert!(matches!(err.root(), KernelError::Io(_)));
    }
}
