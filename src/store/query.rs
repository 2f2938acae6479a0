//! Operation arguments and their validation.
//!
//! Validation runs before any cache or network access. A blank table name
//! counts as missing; an explicit shard id that is blank after trimming
//! counts as "no explicit target".

use serde_json::Value;

use crate::error::{ShardError, ShardResult};
use crate::shard::ShardId;

/// Arguments for `RecordStore::select`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub criteria: Option<String>,
    /// Columns to return; empty means all
    pub columns: Vec<String>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.criteria = Some(criteria.into());
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn validate(&self) -> ShardResult<(&str, &str)> {
        Ok((required_table(&self.table)?, required(&self.criteria, "criteria")?))
    }
}

/// Arguments for `RecordStore::insert`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertQuery {
    pub table: String,
    /// One row (object) or several rows (array of objects)
    pub data: Option<Value>,
}

impl InsertQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub(crate) fn validate(&self) -> ShardResult<(&str, &Value)> {
        let table = required_table(&self.table)?;
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| ShardError::missing_argument("data"))?;
        match data {
            Value::Object(_) => {}
            Value::Array(rows) if !rows.is_empty() && rows.iter().all(Value::is_object) => {}
            _ => {
                return Err(ShardError::InvalidType(
                    "Insert data must be an object or a non-empty array of objects".to_string(),
                ))
            }
        }
        Ok((table, data))
    }
}

/// Arguments for `RecordStore::update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateQuery {
    pub table: String,
    pub criteria: Option<String>,
    /// Column values to set
    pub data: Option<Value>,
    /// Restrict the update to one shard
    pub shard: Option<ShardId>,
}

impl UpdateQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.criteria = Some(criteria.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_shard(mut self, shard: impl Into<ShardId>) -> Self {
        self.shard = Some(shard.into());
        self
    }

    pub(crate) fn validate(&self) -> ShardResult<(&str, &str, &Value)> {
        let table = required_table(&self.table)?;
        let criteria = required(&self.criteria, "criteria")?;
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| ShardError::missing_argument("data"))?;
        if !data.is_object() {
            return Err(ShardError::InvalidType(
                "Update data must be an object of column values".to_string(),
            ));
        }
        Ok((table, criteria, data))
    }

    pub(crate) fn target(&self) -> Option<ShardId> {
        explicit_target(&self.shard)
    }
}

/// Arguments for `RecordStore::delete`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteQuery {
    pub table: String,
    pub criteria: Option<String>,
    /// Restrict the delete to one shard
    pub shard: Option<ShardId>,
    /// Restrict the delete to one row index (ignored when 0)
    pub row_id: Option<u64>,
}

impl DeleteQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.criteria = Some(criteria.into());
        self
    }

    pub fn with_shard(mut self, shard: impl Into<ShardId>) -> Self {
        self.shard = Some(shard.into());
        self
    }

    pub fn with_row_id(mut self, row_id: u64) -> Self {
        self.row_id = Some(row_id);
        self
    }

    pub(crate) fn validate(&self) -> ShardResult<(&str, &str)> {
        Ok((required_table(&self.table)?, required(&self.criteria, "criteria")?))
    }

    pub(crate) fn target(&self) -> Option<ShardId> {
        explicit_target(&self.shard)
    }
}

fn required_table(table: &str) -> ShardResult<&str> {
    if table.trim().is_empty() {
        return Err(ShardError::missing_argument("table"));
    }
    Ok(table)
}

fn required<'a>(value: &'a Option<String>, name: &str) -> ShardResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| ShardError::missing_argument(name))
}

fn explicit_target(shard: &Option<ShardId>) -> Option<ShardId> {
    shard
        .as_ref()
        .map(|s| s.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(ShardId::from)
}
