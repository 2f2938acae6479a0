//! Shard identifiers and shard-tagged records.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of one backing workbook (its resource id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(String);

impl ShardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ShardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A row returned by `select`, tagged with the shard it came from.
///
/// Serializes as the row's own columns plus `workbook_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardRecord {
    #[serde(rename = "workbook_id")]
    pub shard_id: ShardId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ShardRecord {
    pub fn new(shard_id: ShardId, mut fields: Map<String, Value>) -> Self {
        // The tag owns this column
        fields.remove("workbook_id");
        Self { shard_id, fields }
    }

    /// Column value by name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }
}
