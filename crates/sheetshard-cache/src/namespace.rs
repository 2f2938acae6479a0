//! Namespace and table naming
//!
//! A namespace isolates the cache of one configured list of logical tables.
//! It is the SHA-256 of the ordered list rendered as `['a', 'b']`, so the
//! same list in the same order always maps to the same directory and any
//! change of order or content maps elsewhere.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CacheError, CacheResult};

/// Filesystem-safe cache partition identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Derive the namespace for an ordered list of logical table names.
    pub fn from_tables<S: AsRef<str>>(tables: &[S]) -> CacheResult<Self> {
        if tables.is_empty() {
            return Err(CacheError::EmptyNamespace);
        }
        Ok(Self(hex_digest(&Self::render(tables))))
    }

    /// The directory name for this namespace.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn render<S: AsRef<str>>(tables: &[S]) -> String {
        let joined = tables
            .iter()
            .map(|t| t.as_ref())
            .collect::<Vec<_>>()
            .join("', '");
        format!("['{}']", joined)
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// File stem used on disk for a cache table.
///
/// Names that are already `[a-z0-9_-]` are used as-is. Anything else is
/// sanitized and suffixed with 8 hex digits of its SHA-256, so two names
/// that sanitize identically still land in different files.
pub fn table_file_stem(table: &str) -> CacheResult<String> {
    if table.trim().is_empty() {
        return Err(CacheError::InvalidTableName(table.to_string()));
    }
    let clean = sanitize(table);
    if clean == table {
        Ok(clean)
    } else {
        Ok(format!("{}-{}", clean, &hex_digest(table)[..8]))
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn hex_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
