//! Error taxonomy for record store operations.

use sheetshard_cache::CacheError;
use sheetshard_protocol::ResponseError;

use crate::config::ConfigError;
use crate::transport::TransportError;

/// Result type for record store operations
pub type ShardResult<T> = Result<T, ShardError>;

/// Errors surfaced to callers of the record store.
///
/// A `false` or empty result from an operation is not an error: it means
/// the operation applied nowhere. These variants mean it could not be
/// carried out.
#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    /// No logical tables were configured
    #[error("{0}")]
    EmptyInput(String),

    /// A caller-supplied value has the wrong shape
    #[error("{0}")]
    InvalidType(String),

    /// A required argument or credential is absent
    #[error("{0}")]
    MissingData(String),

    /// The backend reported failure, or a response lacked an expected field
    #[error("{0}")]
    UnexpectedResponse(String),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShardError {
    /// `MissingData` for an absent call argument.
    pub fn missing_argument(name: &str) -> Self {
        Self::MissingData(format!("Missing the required argument '{}'", name))
    }
}

impl From<ResponseError> for ShardError {
    fn from(err: ResponseError) -> Self {
        match err {
            ResponseError::Failure(message) => Self::UnexpectedResponse(message),
            other => Self::UnexpectedResponse(other.to_string()),
        }
    }
}
