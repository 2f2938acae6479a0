//! Form-encoded shard requests.

use serde_json::Value;

use crate::method::Method;

/// A single backend request, rendered as ordered form fields.
///
/// Field presence depends on the method; unset fields are not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRequest {
    pub method: Method,
    pub worksheet_name: Option<String>,
    pub criteria: Option<String>,
    pub column_names: Option<String>,
    pub json_data: Option<String>,
    pub data: Option<String>,
    pub row_array: Option<String>,
    pub delete_rows: Option<bool>,
}

impl ShardRequest {
    fn bare(method: Method) -> Self {
        Self {
            method,
            worksheet_name: None,
            criteria: None,
            column_names: None,
            json_data: None,
            data: None,
            row_array: None,
            delete_rows: None,
        }
    }

    /// List the workbooks visible to the caller.
    pub fn workbook_list() -> Self {
        Self::bare(Method::WorkbookList)
    }

    /// Fetch rows matching `criteria`, restricted to `columns` when non-empty.
    pub fn fetch<S: AsRef<str>>(worksheet: &str, criteria: &str, columns: &[S]) -> Self {
        let column_names = columns
            .iter()
            .map(|c| c.as_ref())
            .collect::<Vec<_>>()
            .join(",");
        Self {
            worksheet_name: Some(worksheet.to_string()),
            criteria: Some(criteria.to_string()),
            column_names: Some(column_names),
            ..Self::bare(Method::RecordsFetch)
        }
    }

    /// Append one row (object) or several rows (array of objects).
    pub fn add(worksheet: &str, rows: &Value) -> Self {
        Self {
            worksheet_name: Some(worksheet.to_string()),
            json_data: Some(rows.to_string()),
            ..Self::bare(Method::RecordsAdd)
        }
    }

    /// Set the columns in `data` on every row matching `criteria`.
    pub fn update(worksheet: &str, criteria: &str, data: &Value) -> Self {
        Self {
            worksheet_name: Some(worksheet.to_string()),
            criteria: Some(criteria.to_string()),
            data: Some(data.to_string()),
            ..Self::bare(Method::RecordsUpdate)
        }
    }

    /// Delete rows matching `criteria`, optionally pinned to one row index.
    pub fn delete(worksheet: &str, criteria: &str, row_id: Option<u64>) -> Self {
        let row_array = match row_id {
            Some(id) if id > 0 => format!("[{}]", id),
            _ => String::new(),
        };
        Self {
            worksheet_name: Some(worksheet.to_string()),
            criteria: Some(criteria.to_string()),
            row_array: Some(row_array),
            delete_rows: Some(true),
            ..Self::bare(Method::RecordsDelete)
        }
    }

    /// Render as ordered `(name, value)` form fields.
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut form = vec![("method".to_string(), self.method.as_str().to_string())];
        let optional = [
            ("worksheet_name", self.worksheet_name.clone()),
            ("criteria", self.criteria.clone()),
            ("column_names", self.column_names.clone()),
            ("json_data", self.json_data.clone()),
            ("data", self.data.clone()),
            ("row_array", self.row_array.clone()),
            ("delete_rows", self.delete_rows.map(|b| b.to_string())),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                form.push((name.to_string(), value));
            }
        }
        form
    }
}
