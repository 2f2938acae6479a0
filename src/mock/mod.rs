//! Mock Shard Backend
//!
//! In-process stand-in for the spreadsheet backend, used by tests:
//! - Workbooks with named worksheets holding rows
//! - Per-workbook row limits that trigger capacity-exceeded rejections
//! - Failure injection per workbook and for the directory listing
//! - A log of every request for asserting which shards were contacted

mod backend;
mod criteria;

pub use backend::{MockBackend, MockWorkbook, RecordedCall, MOCK_SHEETS_BASE};
pub use criteria::{matches_all, parse_criteria, Condition};
