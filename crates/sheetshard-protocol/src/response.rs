//! Backend response envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ResponseError;
use crate::CAPACITY_EXCEEDED_CODES;

/// Overall outcome reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Failure,
}

/// One entry of a `workbook.list` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookEntry {
    pub workbook_name: String,
    pub resource_id: String,
}

/// Decoded backend response.
///
/// Only `status` is common to every method. Counters are kept as raw JSON
/// because the backend may send them as numbers or numeric strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShardResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Map<String, Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_of_affected_rows: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_of_rows_deleted: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workbooks: Option<Vec<WorkbookEntry>>,
}

impl ShardResponse {
    /// Decode a raw response body.
    pub fn parse(body: &str) -> Result<Self, ResponseError> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn is_failure(&self) -> bool {
        self.status == Some(ResponseStatus::Failure)
    }

    /// The backend's own error text, unmodified where it sent a string.
    pub fn failure_message(&self) -> String {
        match (&self.error_message, &self.error_code) {
            (Some(Value::String(message)), _) => message.clone(),
            (Some(other), _) if !other.is_null() => other.to_string(),
            (_, Some(code)) if !code.is_null() => format!("backend error code {}", code),
            _ => "backend reported failure without a message".to_string(),
        }
    }

    /// Whether the backend rejected a write because the workbook is full.
    ///
    /// Matches the numeric `error_code`, or an `error_message` that is
    /// itself one of the codes.
    pub fn capacity_exceeded(&self) -> bool {
        [&self.error_code, &self.error_message]
            .into_iter()
            .filter_map(|v| v.as_ref().and_then(as_integer))
            .any(|code| CAPACITY_EXCEEDED_CODES.contains(&code))
    }

    /// Turn a reported failure into `ResponseError::Failure`.
    pub fn ensure_success(self) -> Result<Self, ResponseError> {
        if self.is_failure() {
            return Err(ResponseError::Failure(self.failure_message()));
        }
        Ok(self)
    }

    pub fn into_records(self) -> Result<Vec<Map<String, Value>>, ResponseError> {
        self.records.ok_or(ResponseError::MissingField("records"))
    }

    pub fn into_workbooks(self) -> Result<Vec<WorkbookEntry>, ResponseError> {
        self.workbooks.ok_or(ResponseError::MissingField("workbooks"))
    }

    pub fn affected_rows(&self) -> Result<u64, ResponseError> {
        self.no_of_affected_rows
            .as_ref()
            .and_then(as_count)
            .ok_or(ResponseError::MissingField("no_of_affected_rows"))
    }

    pub fn rows_deleted(&self) -> Result<u64, ResponseError> {
        self.no_of_rows_deleted
            .as_ref()
            .and_then(as_count)
            .ok_or(ResponseError::MissingField("no_of_rows_deleted"))
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
