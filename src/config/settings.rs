//! Typed settings deserialized from the merged configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sheetshard_cache::{CacheConfig, LockOptions};

use crate::auth::{OAuthCredentials, OAuthTokenProvider, StaticToken, TokenProvider};
use crate::error::{ShardError, ShardResult};
use crate::logging::parse_log_level;
use crate::store::{RecordStore, StoreOptions};
use crate::transport::{HttpConfig, HttpTransport, Transport};

use super::effective::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Logical table names, in order; the order defines the cache namespace
    pub workbooks: Vec<String>,
    pub max_concurrency: usize,
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub avoidance: AvoidanceSettings,
    pub auth: AuthSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    pub sheets_base: String,
    pub oauth_base: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub root: PathBuf,
    pub lock_poll_ms: u64,
    /// 0 = never reclaim
    pub lock_stale_secs: u64,
    /// 0 = wait forever
    pub lock_timeout_secs: u64,
}

impl CacheSettings {
    pub fn lock_options(&self) -> LockOptions {
        let nonzero = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
        LockOptions {
            poll_interval: Duration::from_millis(self.lock_poll_ms),
            stale_after: nonzero(self.lock_stale_secs),
            timeout: nonzero(self.lock_timeout_secs),
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            root: self.root.clone(),
            lock: self.lock_options(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvoidanceSettings {
    pub window_secs: u64,
}

/// Either a fixed access token or OAuth client credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    pub access_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub refresh_token: Option<String>,
    /// Redirect URI registered for the client (default `https://example.com`)
    #[serde(default)]
    pub redirect_uri: Option<String>,
    pub cache_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive when `SHEETSHARD_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.avoidance.window_secs == 0 {
            return Err(ConfigError::ValidationError(
                "avoidance.window_secs must be at least 1".to_string(),
            ));
        }
        if self.cache.lock_poll_ms == 0 {
            return Err(ConfigError::ValidationError(
                "cache.lock_poll_ms must be at least 1".to_string(),
            ));
        }
        parse_log_level(&self.logging.level)?;
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "api.timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            sheets_base: self.api.sheets_base.clone(),
            max_concurrency: self.max_concurrency,
            avoidance_window: Duration::from_secs(self.avoidance.window_secs),
            cache: self.cache.cache_config(),
        }
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.api.timeout_secs),
            ..HttpConfig::default()
        }
    }

    /// A static token when `auth.access_token` is set, otherwise the
    /// refresh-token provider.
    pub fn token_provider(&self, transport: Arc<dyn Transport>) -> ShardResult<Arc<dyn TokenProvider>> {
        let auth = &self.auth;
        if let Some(token) = auth.access_token.as_deref().filter(|t| !t.trim().is_empty()) {
            return Ok(Arc::new(StaticToken::new(token)?));
        }
        if auth.client_id.is_none() && auth.client_secret.is_none() {
            return Err(ShardError::MissingData(
                "Missing the access token or OAuth client credentials".to_string(),
            ));
        }
        Ok(Arc::new(self.oauth_provider(transport)?))
    }

    /// The OAuth provider for `auth.client_id` / `auth.client_secret`.
    pub fn oauth_provider(&self, transport: Arc<dyn Transport>) -> ShardResult<OAuthTokenProvider> {
        let auth = &self.auth;
        let credentials = OAuthCredentials {
            client_id: auth.client_id.clone().unwrap_or_default(),
            client_secret: auth.client_secret.clone().unwrap_or_default(),
            refresh_token: auth.refresh_token.clone(),
        };
        let provider =
            OAuthTokenProvider::new(credentials, &self.api.oauth_base, &auth.cache_root, transport)?;
        Ok(match auth.redirect_uri.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(redirect_uri) => provider.with_redirect_uri(redirect_uri),
            None => provider,
        })
    }

    /// Transport for the configured HTTP settings.
    pub fn http_transport(&self) -> ShardResult<Arc<dyn Transport>> {
        Ok(Arc::new(HttpTransport::new(&self.http_config())?))
    }

    /// Open a record store over HTTP using these settings.
    pub fn open_store(&self) -> ShardResult<RecordStore> {
        let transport = self.http_transport()?;
        let tokens = self.token_provider(transport.clone())?;
        RecordStore::new(&self.workbooks, tokens, transport, &self.store_options())
    }
}
