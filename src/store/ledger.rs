//! Full-shard avoidance ledger
//!
//! When a shard rejects an insert for being full, the rejection time is
//! recorded under `full_workbooks/<shard id>`. Inserts skip a shard while
//! its marker is younger than the avoidance window. An older marker is
//! purged on sight, making the shard eligible again. A successful delete on
//! a shard clears its marker since it may have freed capacity.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use sheetshard_cache::{CacheLookup, CacheStore};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::error::ShardResult;
use crate::shard::ShardId;

/// Cache table holding full-shard markers.
pub const FULL_SHARDS_TABLE: &str = "full_workbooks";

/// Default time a full shard is skipped for.
pub const DEFAULT_AVOIDANCE_WINDOW: Duration = Duration::from_secs(3600);

/// Full-shard markers for one namespace.
pub struct FullShardLedger {
    cache: Arc<CacheStore>,
    clock: Arc<dyn Clock>,
    window: Duration,
}

impl FullShardLedger {
    pub fn new(cache: Arc<CacheStore>, window: Duration) -> Self {
        Self {
            cache,
            clock: Arc::new(SystemClock),
            window,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// When the shard was last recorded as full, if a marker exists.
    pub fn marked_at(&self, shard: &ShardId) -> ShardResult<Option<i64>> {
        let lookup = self.cache.get(FULL_SHARDS_TABLE, shard.as_str())?;
        Ok(lookup.found().as_ref().and_then(as_timestamp))
    }

    /// Whether inserts should skip `shard` right now.
    ///
    /// A stale or unreadable marker is purged and the shard is eligible.
    pub fn is_avoided(&self, shard: &ShardId) -> ShardResult<bool> {
        let marker = match self.cache.get(FULL_SHARDS_TABLE, shard.as_str())? {
            CacheLookup::Found(value) => value,
            CacheLookup::NotFound | CacheLookup::TableMissing => return Ok(false),
        };

        let window = i64::try_from(self.window.as_secs()).unwrap_or(i64::MAX);
        match as_timestamp(&marker) {
            Some(marked_at) if marked_at.saturating_add(window) > self.clock.now() => Ok(true),
            _ => {
                self.cache.delete(FULL_SHARDS_TABLE, shard.as_str())?;
                info!(shard = %shard, "full-shard marker expired, shard eligible again");
                Ok(false)
            }
        }
    }

    /// Record that `shard` just rejected a write for being full.
    pub fn mark_full(&self, shard: &ShardId) -> ShardResult<()> {
        let now = self.clock.now();
        self.cache.set(FULL_SHARDS_TABLE, shard.as_str(), json!(now))?;
        info!(shard = %shard, marked_at = now, "shard is full, avoiding it");
        Ok(())
    }

    /// Forget any marker for `shard`. Returns whether one was removed.
    pub fn clear(&self, shard: &ShardId) -> ShardResult<bool> {
        let removed = self.cache.delete(FULL_SHARDS_TABLE, shard.as_str())?.removed();
        if removed {
            debug!(shard = %shard, "full-shard marker cleared");
        }
        Ok(removed)
    }
}

fn as_timestamp(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use sheetshard_cache::{CacheConfig, LockOptions, Namespace};
    use tempfile::TempDir;

    fn ledger(temp_dir: &TempDir, clock: Arc<ManualClock>) -> FullShardLedger {
        let config = CacheConfig {
            root: temp_dir.path().to_path_buf(),
            lock: LockOptions {
                poll_interval: Duration::from_millis(5),
                ..LockOptions::default()
            },
        };
        let cache = CacheStore::open(&config, Namespace::from_tables(&["orders"]).unwrap()).unwrap();
        FullShardLedger::new(Arc::new(cache), DEFAULT_AVOIDANCE_WINDOW).with_clock(clock)
    }

    #[test]
    fn test_unmarked_shard_is_eligible() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ledger(&temp_dir, Arc::new(ManualClock::new(10_000)));

        assert!(!ledger.is_avoided(&ShardId::new("wb1")).unwrap());
    }

    #[test]
    fn test_marker_avoids_within_window() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(10_000));
        let ledger = ledger(&temp_dir, clock.clone());
        let shard = ShardId::new("wb1");

        ledger.mark_full(&shard).unwrap();
        clock.advance(3599);

        assert!(ledger.is_avoided(&shard).unwrap());
        assert_eq!(ledger.marked_at(&shard).unwrap(), Some(10_000));
    }

    #[test]
    fn test_marker_expires_and_is_purged() {
        let temp_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(10_000));
        let ledger = ledger(&temp_dir, clock.clone());
        let shard = ShardId::new("wb1");

        ledger.mark_full(&shard).unwrap();
        clock.advance(3600);

        assert!(!ledger.is_avoided(&shard).unwrap());
        assert_eq!(ledger.marked_at(&shard).unwrap(), None);
    }

    #[test]
    fn test_unreadable_marker_is_purged() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ledger(&temp_dir, Arc::new(ManualClock::new(10_000)));
        let shard = ShardId::new("wb1");
        ledger
            .cache
            .set(FULL_SHARDS_TABLE, shard.as_str(), json!("yesterday"))
            .unwrap();

        assert!(!ledger.is_avoided(&shard).unwrap());
        assert!(ledger.cache.get(FULL_SHARDS_TABLE, "wb1").unwrap() == CacheLookup::NotFound);
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let ledger = ledger(&temp_dir, Arc::new(ManualClock::new(10_000)));
        let shard = ShardId::new("wb1");

        assert!(!ledger.clear(&shard).unwrap());
        ledger.mark_full(&shard).unwrap();
        assert!(ledger.clear(&shard).unwrap());
        assert!(!ledger.is_avoided(&shard).unwrap());
    }
}
