//! Mock backend implementation.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{json, Map, Value};
use sheetshard_protocol::{Method, CAPACITY_EXCEEDED_CODES};

use crate::transport::{HttpMethod, HttpResponse, RequestTemplate, Transport, TransportError};

use super::criteria::{matches_all, parse_criteria, Condition};

/// Base URL the mock answers on. Use it as the store's `sheets_base`.
pub const MOCK_SHEETS_BASE: &str = "https://sheets.mock/api/v2";

/// First data row index; row 1 holds the column headers.
const FIRST_ROW_INDEX: u64 = 2;

/// One backing workbook.
#[derive(Debug, Clone)]
pub struct MockWorkbook {
    pub name: String,
    pub resource_id: String,
    /// Worksheet name -> rows (each row carries `row_index`)
    pub sheets: BTreeMap<String, Vec<Map<String, Value>>>,
    /// Total rows the workbook can hold (None = unlimited)
    pub row_limit: Option<usize>,
    /// Code sent when an add would exceed `row_limit`
    pub capacity_code: i64,
    /// When set, every request to this workbook fails with this message
    pub failure: Option<String>,
    next_row: u64,
}

impl MockWorkbook {
    fn new(name: &str, resource_id: &str) -> Self {
        Self {
            name: name.to_string(),
            resource_id: resource_id.to_string(),
            sheets: BTreeMap::new(),
            row_limit: None,
            capacity_code: CAPACITY_EXCEEDED_CODES[0],
            failure: None,
            next_row: FIRST_ROW_INDEX,
        }
    }

    fn row_count(&self) -> usize {
        self.sheets.values().map(Vec::len).sum()
    }

    fn push_row(&mut self, sheet: &str, mut row: Map<String, Value>) {
        row.insert("row_index".to_string(), json!(self.next_row));
        self.next_row += 1;
        self.sheets.entry(sheet.to_string()).or_default().push(row);
    }
}

/// A request as the mock received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub url: String,
    pub method: HttpMethod,
    pub form: Vec<(String, String)>,
    pub authorization: Option<String>,
}

impl RecordedCall {
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Last path segment: a resource id, or `workbooks` for the listing.
    pub fn target(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct BackendState {
    workbooks: Vec<MockWorkbook>,
    calls: Vec<RecordedCall>,
    listing_failure: Option<String>,
}

/// In-process spreadsheet backend implementing [`Transport`].
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<BackendState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MockBackend::add_workbook`].
    pub fn with_workbook(self, name: &str, resource_id: &str) -> Self {
        self.add_workbook(name, resource_id);
        self
    }

    pub fn add_workbook(&self, name: &str, resource_id: &str) {
        self.state()
            .workbooks
            .push(MockWorkbook::new(name, resource_id));
    }

    /// Create `sheet` if needed and append `rows` (objects) to it.
    pub fn seed_rows(&self, resource_id: &str, sheet: &str, rows: Vec<Value>) {
        self.with_book(resource_id, |book| {
            book.sheets.entry(sheet.to_string()).or_default();
            for row in rows {
                if let Value::Object(row) = row {
                    book.push_row(sheet, row);
                }
            }
        });
    }

    pub fn set_row_limit(&self, resource_id: &str, limit: usize) {
        self.with_book(resource_id, |book| book.row_limit = Some(limit));
    }

    pub fn set_capacity_code(&self, resource_id: &str, code: i64) {
        self.with_book(resource_id, |book| book.capacity_code = code);
    }

    /// Make every request to `resource_id` report failure with `message`.
    pub fn fail_workbook(&self, resource_id: &str, message: &str) {
        self.with_book(resource_id, |book| book.failure = Some(message.to_string()));
    }

    pub fn fail_listing(&self, message: &str) {
        self.state().listing_failure = Some(message.to_string());
    }

    /// Current rows of one worksheet.
    pub fn rows(&self, resource_id: &str, sheet: &str) -> Vec<Map<String, Value>> {
        self.state()
            .workbooks
            .iter()
            .find(|b| b.resource_id == resource_id)
            .and_then(|b| b.sheets.get(sheet).cloned())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    /// Number of requests sent to `target` (resource id or `workbooks`).
    pub fn calls_to(&self, target: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.target() == target)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_book(&self, resource_id: &str, f: impl FnOnce(&mut MockWorkbook)) {
        let mut state = self.state();
        if let Some(book) = state
            .workbooks
            .iter_mut()
            .find(|b| b.resource_id == resource_id)
        {
            f(book);
        }
    }

    fn route(&self, path: &str, template: &RequestTemplate) -> Value {
        let mut state = self.state();

        if path == "workbooks" {
            if let Some(message) = &state.listing_failure {
                return failure(None, message);
            }
            let listed: Vec<Value> = state
                .workbooks
                .iter()
                .map(|b| json!({"workbook_name": b.name, "resource_id": b.resource_id}))
                .collect();
            return json!({"status": "success", "workbooks": listed});
        }

        let Some(book) = state.workbooks.iter_mut().find(|b| b.resource_id == path) else {
            return failure(Some(2801), "Workbook does not exist");
        };
        if let Some(message) = &book.failure {
            return failure(None, message);
        }

        let method = template.form_value("method").and_then(Method::parse);
        let sheet = template.form_value("worksheet_name").unwrap_or_default();
        match method {
            Some(Method::RecordsFetch) => fetch(book, sheet, template),
            Some(Method::RecordsAdd) => add(book, sheet, template),
            Some(Method::RecordsUpdate) => update(book, sheet, template),
            Some(Method::RecordsDelete) => delete(book, sheet, template),
            _ => failure(Some(2800), "Unsupported method"),
        }
    }
}

impl Transport for MockBackend {
    fn request(&self, url: &str, template: &RequestTemplate) -> Result<HttpResponse, TransportError> {
        self.state().calls.push(RecordedCall {
            url: url.to_string(),
            method: template.method,
            form: template.form.clone(),
            authorization: template.header_value("Authorization").map(str::to_string),
        });

        let path = url
            .strip_prefix(MOCK_SHEETS_BASE)
            .map(|p| p.trim_start_matches('/'))
            .ok_or_else(|| TransportError::Request {
                url: url.to_string(),
                message: "unknown host".to_string(),
            })?;
        Ok(HttpResponse::ok(self.route(path, template).to_string()))
    }
}

fn failure(code: Option<i64>, message: &str) -> Value {
    let mut body = json!({"status": "failure", "error_message": message});
    if let Some(code) = code {
        body["error_code"] = json!(code);
    }
    body
}

fn missing_sheet(sheet: &str) -> Value {
    failure(Some(2831), &format!("Worksheet '{}' does not exist", sheet))
}

fn criteria_of(template: &RequestTemplate) -> Result<Vec<Condition>, Value> {
    parse_criteria(template.form_value("criteria").unwrap_or_default())
        .map_err(|message| failure(Some(2830), &message))
}

fn fetch(book: &MockWorkbook, sheet: &str, template: &RequestTemplate) -> Value {
    let Some(rows) = book.sheets.get(sheet) else {
        return missing_sheet(sheet);
    };
    let conditions = match criteria_of(template) {
        Ok(c) => c,
        Err(body) => return body,
    };
    let columns: Vec<&str> = template
        .form_value("column_names")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();

    let records: Vec<Value> = rows
        .iter()
        .filter(|row| matches_all(&conditions, row))
        .map(|row| {
            if columns.is_empty() {
                return Value::Object(row.clone());
            }
            let projected: Map<String, Value> = row
                .iter()
                .filter(|(k, _)| k.as_str() == "row_index" || columns.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(projected)
        })
        .collect();
    json!({"status": "success", "records": records})
}

fn add(book: &mut MockWorkbook, sheet: &str, template: &RequestTemplate) -> Value {
    if !book.sheets.contains_key(sheet) {
        return missing_sheet(sheet);
    }
    let rows: Vec<Map<String, Value>> =
        match serde_json::from_str::<Value>(template.form_value("json_data").unwrap_or_default()) {
            Ok(Value::Object(row)) => vec![row],
            Ok(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| match v {
                    Value::Object(row) => Some(row),
                    _ => None,
                })
                .collect(),
            _ => return failure(Some(2832), "Invalid json_data"),
        };

    if let Some(limit) = book.row_limit {
        if book.row_count() + rows.len() > limit {
            return failure(Some(book.capacity_code), "Workbook row limit reached");
        }
    }
    let added = rows.len();
    for row in rows {
        book.push_row(sheet, row);
    }
    json!({"status": "success", "records_added": added})
}

fn update(book: &mut MockWorkbook, sheet: &str, template: &RequestTemplate) -> Value {
    let conditions = match criteria_of(template) {
        Ok(c) => c,
        Err(body) => return body,
    };
    let Ok(Value::Object(changes)) =
        serde_json::from_str::<Value>(template.form_value("data").unwrap_or_default())
    else {
        return failure(Some(2832), "Invalid data");
    };
    let Some(rows) = book.sheets.get_mut(sheet) else {
        return missing_sheet(sheet);
    };

    let mut affected = 0;
    for row in rows.iter_mut().filter(|row| matches_all(&conditions, row)) {
        for (column, value) in &changes {
            row.insert(column.clone(), value.clone());
        }
        affected += 1;
    }
    json!({"status": "success", "no_of_affected_rows": affected})
}

fn delete(book: &mut MockWorkbook, sheet: &str, template: &RequestTemplate) -> Value {
    let conditions = match criteria_of(template) {
        Ok(c) => c,
        Err(body) => return body,
    };
    let pinned: Option<Vec<u64>> = match template.form_value("row_array").unwrap_or_default() {
        "" => None,
        raw => match serde_json::from_str(raw) {
            Ok(ids) => Some(ids),
            Err(_) => return failure(Some(2832), "Invalid row_array"),
        },
    };
    let Some(rows) = book.sheets.get_mut(sheet) else {
        return missing_sheet(sheet);
    };

    let before = rows.len();
    rows.retain(|row| {
        let in_rows = match &pinned {
            Some(ids) => row
                .get("row_index")
                .and_then(Value::as_u64)
                .is_some_and(|idx| ids.contains(&idx)),
            None => true,
        };
        !(in_rows && matches_all(&conditions, row))
    });
    json!({"status": "success", "no_of_rows_deleted": before - rows.len()})
}
