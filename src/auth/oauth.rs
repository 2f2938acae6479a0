//! OAuth provider with an on-disk token cache.
//!
//! Token state lives in `<cache_root>/<sha256(client_id:client_secret)>/token.json`
//! so distinct client registrations never share a cache entry.
//!
//! Credentials are bootstrapped once with [`OAuthTokenProvider::exchange_code`]:
//! the user visits [`OAuthTokenProvider::authorization_url`], and the URL the
//! browser is redirected to (or just its `code`) is exchanged for an access
//! and refresh token. After that the refresh grant keeps the cache current.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::{ShardError, ShardResult};
use crate::transport::{RequestTemplate, Transport};

use super::TokenProvider;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Redirect URI registered for the client when none is configured.
pub const DEFAULT_REDIRECT_URI: &str = "https://example.com";

const SHEETS_SCOPE: &str = "ZohoSheet.dataAPI.UPDATE,ZohoSheet.dataAPI.READ";

/// Client registration used for the refresh grant.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Seed refresh token; a cached one takes precedence
    pub refresh_token: Option<String>,
}

/// Cached token state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl TokenState {
    /// Whether a usable access token is cached at `now` (UNIX seconds).
    pub fn is_valid_at(&self, now: i64) -> bool {
        match (&self.access_token, self.created_at, self.expires_in) {
            (Some(_), Some(created_at), Some(expires_in)) => created_at + expires_in > now,
            _ => false,
        }
    }
}

/// Token provider using the OAuth refresh-token grant.
pub struct OAuthTokenProvider {
    credentials: OAuthCredentials,
    oauth_base: String,
    token_endpoint: String,
    redirect_uri: String,
    cache_path: PathBuf,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    /// Serializes refreshes within this process
    refresh_guard: Mutex<()>,
}

impl OAuthTokenProvider {
    pub fn new(
        credentials: OAuthCredentials,
        oauth_base: &str,
        cache_root: &Path,
        transport: Arc<dyn Transport>,
    ) -> ShardResult<Self> {
        if credentials.client_id.trim().is_empty() || credentials.client_secret.trim().is_empty() {
            return Err(ShardError::MissingData(
                "Missing the OAuth client credentials".to_string(),
            ));
        }

        let dir = cache_root.join(credential_hash(&credentials));
        fs::create_dir_all(&dir)?;

        let oauth_base = oauth_base.trim_end_matches('/').to_string();
        Ok(Self {
            token_endpoint: format!("{}/token", oauth_base),
            oauth_base,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            cache_path: dir.join("token.json"),
            credentials,
            transport,
            clock: Arc::new(SystemClock),
            refresh_guard: Mutex::new(()),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    /// Consent page that issues an authorization code with offline access.
    pub fn authorization_url(&self) -> ShardResult<String> {
        let url = Url::parse_with_params(
            &format!("{}/auth", self.oauth_base),
            &[
                ("response_type", "code"),
                ("client_id", self.credentials.client_id.as_str()),
                ("scope", SHEETS_SCOPE),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| ShardError::InvalidType(format!("Invalid OAuth base URL: {}", e)))?;
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens and seed the cache.
    ///
    /// Accepts the full URL the consent page redirected to, its query
    /// string, or the bare code. Authorization codes are short-lived, so
    /// this should run soon after consent.
    pub fn exchange_code(&self, redirected: &str) -> ShardResult<String> {
        let code = authorization_code(redirected).ok_or_else(|| {
            ShardError::MissingData(
                "Unable to find an authorization code in the redirected URL".to_string(),
            )
        })?;

        let _guard = self
            .refresh_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let issued_at = self.clock.now();
        let template = RequestTemplate::post(vec![
            ("code".to_string(), code),
            ("client_id".to_string(), self.credentials.client_id.clone()),
            ("client_secret".to_string(), self.credentials.client_secret.clone()),
            ("redirect_uri".to_string(), self.redirect_uri.clone()),
            ("grant_type".to_string(), "authorization_code".to_string()),
        ]);
        let response = self.transport.request(&self.token_endpoint, &template)?;

        let fallback = self.credentials.refresh_token.clone();
        let access_token = self.store_grant(&response.body, issued_at, fallback)?;
        info!("exchanged authorization code for OAuth tokens");
        Ok(access_token)
    }

    /// Path of the cached token file.
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    fn load_state(&self) -> ShardResult<TokenState> {
        match fs::read(&self.cache_path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_default()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(TokenState::default()),
            Err(e) => Err(ShardError::Io(e)),
        }
    }

    fn save_state(&self, state: &TokenState) -> ShardResult<()> {
        let bytes = serde_json::to_vec(state)
            .map_err(|e| ShardError::UnexpectedResponse(e.to_string()))?;
        fs::write(&self.cache_path, bytes)?;
        Ok(())
    }

    fn refresh(&self, state: TokenState) -> ShardResult<String> {
        let refresh_token = state
            .refresh_token
            .clone()
            .or_else(|| self.credentials.refresh_token.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ShardError::MissingData("Missing a refresh token for the OAuth client".to_string())
            })?;

        let issued_at = self.clock.now();
        let template = RequestTemplate::post(vec![
            ("client_id".to_string(), self.credentials.client_id.clone()),
            ("client_secret".to_string(), self.credentials.client_secret.clone()),
            ("refresh_token".to_string(), refresh_token.clone()),
            ("grant_type".to_string(), "refresh_token".to_string()),
        ]);
        let response = self.transport.request(&self.token_endpoint, &template)?;

        let access_token = self.store_grant(&response.body, issued_at, Some(refresh_token))?;
        info!("refreshed OAuth access token");
        Ok(access_token)
    }

    /// Persist a token endpoint response. A refresh token in the response
    /// replaces `fallback_refresh`.
    fn store_grant(
        &self,
        body: &str,
        issued_at: i64,
        fallback_refresh: Option<String>,
    ) -> ShardResult<String> {
        let body: Value = serde_json::from_str(body).unwrap_or(Value::Null);
        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ShardError::UnexpectedResponse("Failed to obtain an access token".to_string())
            })?
            .to_string();
        let refresh_token = body
            .get("refresh_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or(fallback_refresh);
        let expires_in = body
            .get("expires_in")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_EXPIRES_IN);

        let state = TokenState {
            access_token: Some(access_token.clone()),
            refresh_token,
            expires_in: Some(expires_in),
            created_at: Some(issued_at),
        };
        self.save_state(&state)?;
        debug!(expires_in, "cached OAuth token state");
        Ok(access_token)
    }
}

impl TokenProvider for OAuthTokenProvider {
    fn get_valid_token(&self) -> ShardResult<String> {
        let _guard = self
            .refresh_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let state = self.load_state()?;
        if state.is_valid_at(self.clock.now()) {
            if let Some(token) = state.access_token {
                debug!("using cached OAuth access token");
                return Ok(token);
            }
        }
        self.refresh(state)
    }
}

/// Pull the `code` parameter out of a redirect URL or query string, or take
/// the input as a bare code.
fn authorization_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(input) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
            .filter(|code| !code.is_empty());
    }
    if input.contains('=') {
        return input
            .trim_start_matches('?')
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == "code")
            .map(|(_, value)| value.to_string())
            .filter(|code| !code.is_empty());
    }
    if input.contains(['/', '?', '&']) {
        None
    } else {
        Some(input.to_string())
    }
}

fn credential_hash(credentials: &OAuthCredentials) -> String {
    let mut hasher = Sha256::new();
    hasher.update(credentials.client_id.as_bytes());
    hasher.update(b":");
    hasher.update(credentials.client_secret.as_bytes());
    hex::encode(hasher.finalize())
}
