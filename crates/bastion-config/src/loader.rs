//! Configuration loader with multi-source merging

use crate::{BastionConfig, Paths};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "BASTION".to_string(),
            user_config: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "BASTION")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/bastion/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<BastionConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = BastionConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/bastion/config.toml)
        if self.user_config
            && let Ok(user_config_file) = Paths::new().user_config_file()
        {
            builder = builder.add_source(toml_file(user_config_file));
        }

        // 3. Project config (bastion.toml)
        builder = builder.add_source(toml_file(Paths::project_config_file(&self.project_dir)));

        // 4. Local config (bastion.local.toml)
        builder = builder.add_source(toml_file(Paths::local_config_file(&self.project_dir)));

        // 5. Environment variables (BASTION_*)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let bastion_config: BastionConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        bastion_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(bastion_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> BastionConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn toml_file(path: PathBuf) -> impl config::Source + Send + Sync + 'static {
    config::File::from(path)
        .required(false)
        .format(config::FileFormat::Toml)
}
