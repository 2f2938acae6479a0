//! Record store
//!
//! CRUD-like operations over records spread across shards:
//! - `select` fans out to every shard and concatenates results in shard order
//! - `insert` tries shards in order, skipping and recording full ones
//! - `update`/`delete` target one shard or fan out to all of them
//!
//! Nothing here is transactional. A fan-out write that fails on one shard
//! may already have applied on others.

mod escape;
mod insert;
mod ledger;
mod mutate;
mod query;
mod select;

use std::sync::Arc;
use std::time::Duration;

use sheetshard_cache::{CacheConfig, CacheStore, Namespace};
use sheetshard_protocol::{ShardRequest, ShardResponse, DEFAULT_SHEETS_API_BASE};
use tracing::debug;

use crate::auth::TokenProvider;
use crate::clock::Clock;
use crate::directory::ShardDirectory;
use crate::error::{ShardError, ShardResult};
use crate::shard::ShardId;
use crate::transport::{HttpResponse, RequestTemplate, Transport};

pub use escape::escape;
pub use ledger::{FullShardLedger, DEFAULT_AVOIDANCE_WINDOW, FULL_SHARDS_TABLE};
pub use query::{DeleteQuery, InsertQuery, SelectQuery, UpdateQuery};

/// Default number of concurrent requests in a fan-out.
pub const DEFAULT_MAX_CONCURRENCY: usize = 24;

/// Record store options.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Base URL of the sheets API; shard URLs are `<base>/<shard id>`
    pub sheets_base: String,
    /// Concurrent requests per fan-out
    pub max_concurrency: usize,
    /// How long a full shard is skipped by inserts
    pub avoidance_window: Duration,
    /// Cache location and lock behaviour
    pub cache: CacheConfig,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            sheets_base: DEFAULT_SHEETS_API_BASE.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            avoidance_window: DEFAULT_AVOIDANCE_WINDOW,
            cache: CacheConfig::default(),
        }
    }
}

/// Sharded record store over a fixed list of logical tables.
pub struct RecordStore {
    directory: ShardDirectory,
    cache: Arc<CacheStore>,
    ledger: FullShardLedger,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenProvider>,
    sheets_base: String,
    max_concurrency: usize,
}

impl RecordStore {
    /// Create a store for the ordered list of logical table names.
    ///
    /// The list determines the cache namespace; it is not sorted.
    pub fn new<S: AsRef<str>>(
        workbooks: &[S],
        tokens: Arc<dyn TokenProvider>,
        transport: Arc<dyn Transport>,
        options: &StoreOptions,
    ) -> ShardResult<Self> {
        if workbooks.is_empty() {
            return Err(ShardError::EmptyInput(
                "Couldn't find any workbook names to use".to_string(),
            ));
        }
        let names: Vec<String> = workbooks.iter().map(|w| w.as_ref().to_string()).collect();

        let namespace = Namespace::from_tables(&names)?;
        let cache = Arc::new(CacheStore::open(&options.cache, namespace)?);
        let sheets_base = options.sheets_base.trim_end_matches('/').to_string();

        Ok(Self {
            directory: ShardDirectory::new(
                names,
                &sheets_base,
                cache.clone(),
                transport.clone(),
                tokens.clone(),
            ),
            ledger: FullShardLedger::new(cache.clone(), options.avoidance_window),
            cache,
            transport,
            tokens,
            sheets_base,
            max_concurrency: options.max_concurrency.max(1),
        })
    }

    /// Use `clock` for full-shard marker timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ledger = self.ledger.with_clock(clock);
        self
    }

    pub fn namespace(&self) -> &Namespace {
        self.cache.namespace()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn ledger(&self) -> &FullShardLedger {
        &self.ledger
    }

    pub fn directory(&self) -> &ShardDirectory {
        &self.directory
    }

    /// The resolved shard list.
    pub fn shards(&self) -> ShardResult<Vec<ShardId>> {
        self.directory.resolve_shards()
    }

    /// Discard the cached shard list and resolve it again.
    pub fn refresh_shards(&self) -> ShardResult<Vec<ShardId>> {
        self.directory.refresh()
    }

    /// Substitute criteria parameters. See [`escape`].
    pub fn escape<K: AsRef<str>, V: AsRef<str>>(&self, criteria: &str, parameters: &[(K, V)]) -> String {
        escape(criteria, parameters)
    }

    fn shard_url(&self, shard: &ShardId) -> String {
        format!("{}/{}", self.sheets_base, shard)
    }

    /// POST template for `request` carrying a fresh bearer token.
    fn authorized(&self, request: &ShardRequest) -> ShardResult<RequestTemplate> {
        Ok(RequestTemplate::post(request.to_form()).with_bearer(&self.tokens.get_valid_token()?))
    }

    /// Send `request` to one shard and decode the reply without judging it.
    fn send_raw(&self, shard: &ShardId, template: &RequestTemplate) -> ShardResult<ShardResponse> {
        let response = self.transport.request(&self.shard_url(shard), template)?;
        Ok(ShardResponse::parse(&response.body)?)
    }

    /// Send `request` to one shard; a reported failure is an error.
    fn send(&self, shard: &ShardId, request: &ShardRequest) -> ShardResult<ShardResponse> {
        let template = self.authorized(request)?;
        Ok(self.send_raw(shard, &template)?.ensure_success()?)
    }

    /// Send the same request to every shard; responses in shard order.
    fn fan_out(&self, shards: &[ShardId], request: &ShardRequest) -> ShardResult<Vec<HttpResponse>> {
        let template = self.authorized(request)?;
        let urls: Vec<String> = shards.iter().map(|s| self.shard_url(s)).collect();
        debug!(method = %request.method, shards = urls.len(), "fanning out");

        let responses = self
            .transport
            .parallel_requests(&urls, self.max_concurrency, &template)?;
        if responses.len() != shards.len() {
            return Err(ShardError::UnexpectedResponse(format!(
                "expected {} responses from the fan-out, got {}",
                shards.len(),
                responses.len()
            )));
        }
        Ok(responses)
    }
}
