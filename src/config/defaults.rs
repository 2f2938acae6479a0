//! Built-in defaults (layer 1)

use serde_json::{json, Value};
use sheetshard_protocol::{DEFAULT_OAUTH_API_BASE, DEFAULT_SHEETS_API_BASE};

use crate::store::DEFAULT_MAX_CONCURRENCY;

/// Built-in default configuration values
#[derive(Debug, Clone)]
pub struct BuiltinDefaults {
    pub max_concurrency: usize,
    pub sheets_base: String,
    pub oauth_base: String,
    pub timeout_secs: u64,
    pub cache_root: String,
    pub lock_poll_ms: u64,
    /// 0 = never reclaim a lock marker
    pub lock_stale_secs: u64,
    /// 0 = wait for a lock forever
    pub lock_timeout_secs: u64,
    pub avoidance_window_secs: u64,
    pub auth_cache_root: String,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            sheets_base: DEFAULT_SHEETS_API_BASE.to_string(),
            oauth_base: DEFAULT_OAUTH_API_BASE.to_string(),
            timeout_secs: 60,
            cache_root: ".sheetshard/db_cache".to_string(),
            lock_poll_ms: 1000,
            lock_stale_secs: 0,
            lock_timeout_secs: 0,
            avoidance_window_secs: 3600,
            auth_cache_root: ".sheetshard/auth_cache".to_string(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> Value {
        json!({
            "workbooks": [],
            "max_concurrency": self.max_concurrency,
            "api": {
                "sheets_base": self.sheets_base,
                "oauth_base": self.oauth_base,
                "timeout_secs": self.timeout_secs
            },
            "cache": {
                "root": self.cache_root,
                "lock_poll_ms": self.lock_poll_ms,
                "lock_stale_secs": self.lock_stale_secs,
                "lock_timeout_secs": self.lock_timeout_secs
            },
            "avoidance": {
                "window_secs": self.avoidance_window_secs
            },
            "auth": {
                "cache_root": self.auth_cache_root
            },
            "logging": {
                "level": self.log_level,
                "json": self.log_json
            }
        })
    }
}
