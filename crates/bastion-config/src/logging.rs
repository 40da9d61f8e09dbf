//! Log subscriber setup.

use crate::{ConfigError, LoggingConfig};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// Directives from `RUST_LOG` are kept; the configured level is added on
/// top. Fails if a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let level = parse_level(&config.level)?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_ansi(config.ansi)
        .try_init()
        .map_err(|e| ConfigError::LoggingError(e.to_string()))
}

pub(crate) fn parse_level(level: &str) -> Result<Level, ConfigError> {
    level
        .parse::<Level>()
        .map_err(|_| ConfigError::ValidationError(format!("unknown log level {level:?}")))
}
