//! Kernel configuration
//!
//! Settings for the `modkernel` binary: log filter, the name of the root
//! container, which built-in prototypes to register and how to report a
//! loaded project.
//!
//! # Location
//!
//! The config file lives in the platform-appropriate config directory:
//! - **Linux**: `~/.config/dev.hxyulin.modkernel/config.toml`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.modkernel/config.toml`
//! - **Windows**: `%APPDATA%\dev.hxyulin.modkernel\config.toml`
//!
//! A missing file is not an error; every field has a default.
//!
//! # Example
//!
//! ```ignore
//! use modkernel::config::KernelConfig;
//!
//! let config = KernelConfig::load_or_default();
//! let factory = modkernel::kernel::ModuleFactory::global();
//! factory.load_filtered(&config.prototype_whitelist);
//! ```

use crate::error::{KernelError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "dev.hxyulin.modkernel";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default tracing filter when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info,modkernel=debug";

/// Default name of the top-level container
pub const DEFAULT_ROOT_CONTAINER: &str = "root";

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir()
        .ok_or_else(|| KernelError::Config("Could not determine config directory".into()))?;
    std::fs::create_dir_all(&dir).map_err(|e| {
        KernelError::Config(format!("Failed to create config directory {:?}: {}", dir, e))
    })?;
    Ok(dir)
}

/// Default path of the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,

    /// Optional log file, written through a non-blocking appender
    pub log_file: Option<PathBuf>,

    /// Name given to the root container
    pub root_container: String,

    /// Built-in prototypes to register; empty registers all of them
    pub prototype_whitelist: Vec<String>,

    /// Project loaded by `run` when no path is given
    pub default_project: Option<PathBuf>,

    /// Print apply reports as JSON instead of text
    pub json_report: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_file: None,
            root_container: DEFAULT_ROOT_CONTAINER.to_string(),
            prototype_whitelist: Vec::new(),
            default_project: None,
            json_report: false,
        }
    }
}

impl KernelConfig {
    /// Load from `path`, returning defaults if the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            KernelError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            KernelError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Load from the default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Using default config: {}", e);
            Self::default()
        })
    }

    /// Save to `path` as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                KernelError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| KernelError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            KernelError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = KernelConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, KernelConfig::default());
        assert_eq!(config.root_container, "root");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "json_report = true\nprototype_whitelist = [\"Data Module\"]\n",
        )
        .unwrap();

        let config = KernelConfig::load(&path).unwrap();
        assert!(config.json_report);
        assert_eq!(config.prototype_whitelist, vec!["Data Module".to_string()]);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = KernelConfig {
            root_container: "workbench".into(),
            default_project: Some(PathBuf::from("brain.owproj")),
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(KernelConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "json_report = \"maybe\"").unwrap();
        assert!(matches!(
            KernelConfig::load(&path),
            Err(KernelError::Config(_))
        ));
    }
}
