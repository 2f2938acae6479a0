//! Errors raised while interpreting backend responses.

use thiserror::Error;

/// Response interpretation errors
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The body was not a JSON object of the expected shape
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The backend reported `status: failure`; carries its message verbatim
    #[error("{0}")]
    Failure(String),

    /// A field the operation depends on was absent or had the wrong type
    #[error("response is missing the '{0}' field")]
    MissingField(&'static str),
}
