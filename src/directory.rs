//! Shard directory
//!
//! Resolves the configured logical table names to the ordered list of shard
//! ids. The list is cached under `workbooks/workbooks` in the namespace's
//! cache and is only re-resolved when that entry is missing or empty. A
//! different set of logical tables has a different namespace, so a cached
//! list never outlives the configuration that produced it.

use std::sync::Arc;

use serde_json::Value;
use sheetshard_cache::{CacheLookup, CacheStore};
use sheetshard_protocol::{ShardRequest, ShardResponse};
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::error::{ShardError, ShardResult};
use crate::shard::ShardId;
use crate::transport::{RequestTemplate, Transport};

/// Cache table holding the resolved shard list.
pub const SHARD_LIST_TABLE: &str = "workbooks";

/// Key of the shard list within `SHARD_LIST_TABLE`.
pub const SHARD_LIST_KEY: &str = "workbooks";

/// Resolves and caches the shard list for one configuration.
pub struct ShardDirectory {
    workbooks: Vec<String>,
    sheets_base: String,
    cache: Arc<CacheStore>,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
}

impl ShardDirectory {
    pub fn new(
        workbooks: Vec<String>,
        sheets_base: &str,
        cache: Arc<CacheStore>,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            workbooks,
            sheets_base: sheets_base.trim_end_matches('/').to_string(),
            cache,
            transport,
            tokens,
        }
    }

    /// Configured logical table names, in configured order.
    pub fn workbooks(&self) -> &[String] {
        &self.workbooks
    }

    /// The cached shard list, resolving it live when absent or empty.
    pub fn resolve_shards(&self) -> ShardResult<Vec<ShardId>> {
        match self.cache.get(SHARD_LIST_TABLE, SHARD_LIST_KEY)? {
            CacheLookup::Found(value) => match decode_shard_list(&value) {
                Some(shards) if !shards.is_empty() => Ok(shards),
                Some(_) => {
                    debug!("cached shard list is empty, resolving");
                    self.fetch_shards()
                }
                None => {
                    warn!("cached shard list is malformed, resolving");
                    self.fetch_shards()
                }
            },
            CacheLookup::NotFound | CacheLookup::TableMissing => {
                debug!("no cached shard list, resolving");
                self.fetch_shards()
            }
        }
    }

    /// Drop the cached list and resolve it again.
    pub fn refresh(&self) -> ShardResult<Vec<ShardId>> {
        self.cache.drop_table(SHARD_LIST_TABLE)?;
        self.fetch_shards()
    }

    fn fetch_shards(&self) -> ShardResult<Vec<ShardId>> {
        let url = format!("{}/workbooks", self.sheets_base);
        let template = RequestTemplate::get(ShardRequest::workbook_list().to_form())
            .with_bearer(&self.tokens.get_valid_token()?);

        let response = self.transport.request(&url, &template)?;
        let listed = ShardResponse::parse(&response.body)?
            .ensure_success()?
            .into_workbooks()?;

        let shards: Vec<ShardId> = listed
            .into_iter()
            .filter(|entry| self.workbooks.contains(&entry.workbook_name))
            .map(|entry| ShardId::new(entry.resource_id))
            .collect();
        if shards.is_empty() {
            return Err(ShardError::UnexpectedResponse(
                "Unable to find any workbooks with the name(s) specified".to_string(),
            ));
        }

        let ids: Vec<&str> = shards.iter().map(ShardId::as_str).collect();
        self.cache
            .set(SHARD_LIST_TABLE, SHARD_LIST_KEY, serde_json::json!(ids))?;
        info!(count = shards.len(), "resolved shard list");

        Ok(shards)
    }
}

fn decode_shard_list(value: &Value) -> Option<Vec<ShardId>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(ShardId::from))
        .collect()
}
