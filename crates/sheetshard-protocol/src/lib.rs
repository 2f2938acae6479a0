//! Sheetshard protocol types
//!
//! Request and response shapes for the spreadsheet backend that hosts each
//! shard. Requests are form-encoded with a `method` discriminator; responses
//! are JSON objects carrying `status` plus operation-specific fields.

pub mod error;
pub mod method;
pub mod request;
pub mod response;

pub use error::ResponseError;
pub use method::Method;
pub use request::ShardRequest;
pub use response::{ResponseStatus, ShardResponse, WorkbookEntry};

/// Default base URL of the sheets data API.
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheet.zoho.com/api/v2";

/// Default base URL of the OAuth token endpoint.
pub const DEFAULT_OAUTH_API_BASE: &str = "https://accounts.zoho.com/oauth/v2";

/// Error codes the backend uses when a workbook cannot take more rows.
pub const CAPACITY_EXCEEDED_CODES: [i64; 2] = [2870, 2872];
