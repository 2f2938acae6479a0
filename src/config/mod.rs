//! Layered configuration
//!
//! Four layers, later ones winning:
//! 1. Built-in defaults
//! 2. User config (`$XDG_CONFIG_HOME/sheetshard/config.toml`)
//! 3. Project config (`./sheetshard.toml`, or `--config PATH`)
//! 4. CLI overrides
//!
//! The merged value is deserialized into [`Settings`].

mod defaults;
mod effective;
mod merge;
mod settings;

pub use defaults::BuiltinDefaults;
pub use effective::{
    user_config_path, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig,
    PROJECT_CONFIG_FILE,
};
pub use merge::{deep_merge, merge_layers};
pub use settings::{
    ApiSettings, AuthSettings, AvoidanceSettings, CacheSettings, LoggingSettings, Settings,
};
