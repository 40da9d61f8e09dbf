//! Configuration management for Bastion
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (BASTION_* prefix, highest precedence)
//! 2. bastion.local.toml (untracked, local overrides)
//! 3. bastion.toml (project config)
//! 4. ~/.config/bastion/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod logging;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use logging::init_tracing;
pub use paths::Paths;

/// Main Bastion configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BastionConfig {
    pub rbac: RbacConfig,
    pub logging: LoggingConfig,
}

/// Access-decision settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RbacConfig {
    /// Log every access decision.
    pub audit: bool,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self { audit: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level: trace, debug, info, warn or error.
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

impl BastionConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Read a single TOML file, without layering.
    pub fn from_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML, e.g. to seed a project's `bastion.toml`.
    pub fn to_toml(&self) -> std::result::Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks values the type system cannot.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        logging::parse_level(&self.logging.level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = BastionConfig::default();
        assert!(config.rbac.audit);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.ansi);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_level() {
        let mut config = BastionConfig::default();
        config.logging.level = "chatty".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("bastion.toml");

        let mut config = BastionConfig::default();
        config.rbac.audit = false;
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        assert_eq!(BastionConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_from_file_errors() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let missing = temp_dir.path().join("missing.toml");
        assert!(matches!(
            BastionConfig::from_file(&missing),
            Err(ConfigError::ReadError { .. })
        ));

        let broken = temp_dir.path().join("broken.toml");
        std::fs::write(&broken, "[rbac\naudit = ").unwrap();
        assert!(matches!(
            BastionConfig::from_file(&broken),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
