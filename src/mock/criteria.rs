//! Minimal criteria evaluation for the mock backend.
//!
//! Understands an empty criteria (every row) and equality clauses such as
//! `"name"="Ada"` joined with `and`.

use regex_lite::Regex;
use serde_json::{Map, Value};

/// One `column = value` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: String,
    pub value: String,
}

impl Condition {
    pub fn matches(&self, row: &Map<String, Value>) -> bool {
        match row.get(&self.column) {
            Some(Value::String(s)) => s == &self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Parse criteria into equality clauses.
pub fn parse_criteria(criteria: &str) -> Result<Vec<Condition>, String> {
    let trimmed = criteria.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let clause = Regex::new(r#"^\s*"?([^"=]+?)"?\s*=\s*(?:"([^"]*)"|'([^']*)'|(\S+))\s*$"#)
        .map_err(|e| e.to_string())?;
    let splitter = Regex::new(r"(?i)\s+and\s+").map_err(|e| e.to_string())?;

    splitter
        .split(trimmed)
        .map(|part| {
            let caps = clause
                .captures(part)
                .ok_or_else(|| format!("Invalid criteria: {}", part))?;
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            Ok(Condition {
                column: caps[1].trim().to_string(),
                value,
            })
        })
        .collect()
}

/// Whether `row` satisfies every clause.
pub fn matches_all(conditions: &[Condition], row: &Map<String, Value>) -> bool {
    conditions.iter().all(|c| c.matches(row))
}
