//! Logging setup for the binary.
//!
//! Events go to stderr so command output on stdout stays parseable. The
//! filter comes from `SHEETSHARD_LOG` when set, else from the configured
//! level.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{ConfigError, LoggingSettings};

/// Environment variable holding a filter directive, e.g. `sheetshard=debug`.
pub const LOG_ENV_VAR: &str = "SHEETSHARD_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), ConfigError> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let registry = Registry::default().with(filter);
    let installed = if settings.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init()
    };
    installed.map_err(|e| ConfigError::ValidationError(format!("logging: {}", e)))
}

/// Parse a level name (`trace` .. `error`, case-insensitive).
pub fn parse_log_level(level: &str) -> Result<Level, ConfigError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(ConfigError::ValidationError(format!(
            "Invalid log level: {}. Use trace, debug, info, warn, or error",
            level
        ))),
    }
}
