//! Bearer token providers.
//!
//! The record store only needs a currently valid token for each request.
//! How it is obtained and refreshed is up to the provider.

mod oauth;

pub use oauth::{OAuthCredentials, OAuthTokenProvider, TokenState, DEFAULT_REDIRECT_URI};

use crate::error::{ShardError, ShardResult};

/// Supplies a bearer token, refreshing it transparently when needed.
pub trait TokenProvider: Send + Sync {
    fn get_valid_token(&self) -> ShardResult<String>;
}

/// A fixed, externally managed access token.
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> ShardResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ShardError::MissingData(
                "Missing the access token".to_string(),
            ));
        }
        Ok(Self { token })
    }
}

impl TokenProvider for StaticToken {
    fn get_valid_token(&self) -> ShardResult<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token() {
        let provider = StaticToken::new("abc").unwrap();
        assert_eq!(provider.get_valid_token().unwrap(), "abc");
    }

    #[test]
    fn test_static_token_rejects_blank() {
        assert!(matches!(StaticToken::new(" "), Err(ShardError::MissingData(_))));
    }
}
