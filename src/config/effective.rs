//! Effective configuration with provenance
//!
//! Records which files contributed to the merged configuration (with a
//! digest of their bytes) and renders it with secrets redacted.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use super::settings::Settings;

/// Project config file name, looked up in the working directory.
pub const PROJECT_CONFIG_FILE: &str = "sheetshard.toml";

/// Keys that contain secrets and should be redacted
const SECRET_KEYS: &[&str] = &["password", "token", "secret", "api_key", "credential"];

/// `$XDG_CONFIG_HOME/sheetshard/config.toml`, else `~/.config/sheetshard/config.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    let base = match env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(env::var_os("HOME")?).join(".config"),
    };
    Some(base.join("sheetshard").join("config.toml"))
}

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    User,
    Project,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ConfigSource {
    fn inline(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            path: None,
            digest: None,
        }
    }
}

/// Merged configuration and the sources that produced it.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub created_at: DateTime<Utc>,
    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
    config: Value,
}

impl EffectiveConfig {
    /// Merge defaults, the user and project files (when they exist), and
    /// CLI overrides, then validate the result.
    pub fn build(
        user_config_path: Option<&Path>,
        project_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource::inline(ConfigOrigin::Builtin)];

        let files = [
            (ConfigOrigin::User, user_config_path),
            (ConfigOrigin::Project, project_config_path),
        ];
        for (origin, path) in files {
            let Some(path) = path.filter(|p| p.exists()) else {
                continue;
            };
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource::inline(ConfigOrigin::Cli));
        }

        let effective = Self {
            created_at: Utc::now(),
            sources,
            config: merge_layers(layers),
        };
        effective.settings()?;
        Ok(effective)
    }

    /// Typed, validated settings.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let settings: Settings = serde_json::from_value(self.config.clone())
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// The merged configuration with secret-like values replaced, plus
    /// provenance. Safe to print.
    pub fn redacted(&self) -> Value {
        let mut config = self.config.clone();
        let mut redactions = Vec::new();
        redact_recursive(&mut config, String::new(), &mut redactions);
        json!({
            "created_at": self.created_at,
            "config": config,
            "sources": self.sources,
            "redactions": redactions,
        })
    }

    /// Get a config value by dot-separated path
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.config, |current, part| current.get(part))
    }
}

/// Load and parse a TOML file, returning the value and digest
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes)
        .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;
    let table: toml::Value = toml::from_str(&contents).map_err(|e| {
        ConfigError::ParseError(format!("TOML parse error in {}: {}", path.display(), e))
    })?;

    Ok((toml_to_json(table), digest))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let current_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                let key_lower = key.to_lowercase();
                let is_secret = SECRET_KEYS.iter().any(|s| key_lower.contains(s));

                if is_secret && !val.is_object() && !val.is_array() && !val.is_null() {
                    *val = Value::String("[REDACTED]".to_string());
                    redactions.push(current_path);
                } else {
                    redact_recursive(val, current_path, redactions);
                }
            }
        }
        Value::Array(items) => {
            for (i, val) in items.iter_mut().enumerate() {
                redact_recursive(val, format!("{}[{}]", path, i), redactions);
            }
        }
        _ => {}
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_with_defaults_only() {
        let config = EffectiveConfig::build(None, None, None).unwrap();

        assert_eq!(config.get("max_concurrency"), Some(&json!(24)));
        assert_eq!(config.get("cache.lock_poll_ms"), Some(&json!(1000)));
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Builtin);
    }

    #[test]
    fn test_project_file_over_user_file() {
        let mut user = NamedTempFile::new().unwrap();
        writeln!(user, "workbooks = [\"orders\"]").unwrap();
        writeln!(user, "max_concurrency = 8").unwrap();
        let mut project = NamedTempFile::new().unwrap();
        writeln!(project, "[avoidance]").unwrap();
        writeln!(project, "window_secs = 120").unwrap();
        writeln!(project, "[cache]").unwrap();
        writeln!(project, "lock_poll_ms = 25").unwrap();

        let config = EffectiveConfig::build(Some(user.path()), Some(project.path()), None).unwrap();
        let settings = config.settings().unwrap();

        assert_eq!(settings.workbooks, vec!["orders".to_string()]);
        assert_eq!(settings.max_concurrency, 8);
        assert_eq!(settings.avoidance.window_secs, 120);
        assert_eq!(settings.cache.lock_poll_ms, 25);
        assert_eq!(settings.cache.root, PathBuf::from(".sheetshard/db_cache"));
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[2].origin, ConfigOrigin::Project);
        assert_eq!(config.sources[2].digest.as_ref().unwrap().len(), 64);
    }

    #[test]
    fn test_missing_files_are_skipped() {
        let config = EffectiveConfig::build(
            Some(Path::new("/nonexistent/sheetshard/config.toml")),
            None,
            None,
        )
        .unwrap();
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut project = NamedTempFile::new().unwrap();
        writeln!(project, "max_concurrency = 8").unwrap();

        let cli = json!({"max_concurrency": 3, "workbooks": ["a", "b"]});
        let config = EffectiveConfig::build(None, Some(project.path()), Some(cli)).unwrap();
        let settings = config.settings().unwrap();

        assert_eq!(settings.max_concurrency, 3);
        assert_eq!(settings.workbooks, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(config.sources.last().unwrap().origin, ConfigOrigin::Cli);
    }

    #[test]
    fn test_validation_failure() {
        let result = EffectiveConfig::build(None, None, Some(json!({"max_concurrency": 0})));
        assert!(matches!(result, Err(ConfigError::ValidationError(ref m)) if m.contains("max_concurrency")));
    }

    #[test]
    fn test_malformed_toml() {
        let mut project = NamedTempFile::new().unwrap();
        writeln!(project, "max_concurrency = ").unwrap();

        let result = EffectiveConfig::build(None, Some(project.path()), None);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_secret_redaction() {
        let cli = json!({
            "auth": {
                "client_id": "1000.ABC",
                "client_secret": "shh",
                "refresh_token": "1000.refresh"
            }
        });
        let config = EffectiveConfig::build(None, None, Some(cli)).unwrap();
        let rendered = config.redacted();

        assert_eq!(rendered["config"]["auth"]["client_secret"], "[REDACTED]");
        assert_eq!(rendered["config"]["auth"]["refresh_token"], "[REDACTED]");
        assert_eq!(rendered["config"]["auth"]["client_id"], "1000.ABC");
        let redactions = rendered["redactions"].as_array().unwrap();
        assert!(redactions.contains(&json!("auth.client_secret")));

        // Redaction is only applied to the rendering
        let settings = config.settings().unwrap();
        assert_eq!(settings.auth.client_secret.as_deref(), Some("shh"));
    }
}
