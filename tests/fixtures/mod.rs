//! Shared fixtures for record store integration tests.
//!
//! Every store runs against an in-process `MockBackend`, a scratch cache
//! root and a manual clock.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use sheetshard::mock::{MockBackend, MOCK_SHEETS_BASE};
use sheetshard::{ManualClock, RecordStore, StaticToken, StoreOptions};
use sheetshard_cache::{CacheConfig, LockOptions};
use tempfile::TempDir;

pub const TOKEN: &str = "test-token";
pub const START: i64 = 1_700_000_000;
pub const SHEET: &str = "Orders";

pub fn store_options(temp_dir: &TempDir) -> StoreOptions {
    StoreOptions {
        sheets_base: MOCK_SHEETS_BASE.to_string(),
        max_concurrency: 4,
        avoidance_window: Duration::from_secs(3600),
        cache: CacheConfig {
            root: temp_dir.path().join("db_cache"),
            lock: LockOptions {
                poll_interval: Duration::from_millis(5),
                stale_after: None,
                timeout: Some(Duration::from_secs(10)),
            },
        },
    }
}

pub fn open_store(
    names: &[&str],
    backend: &Arc<MockBackend>,
    clock: &Arc<ManualClock>,
    temp_dir: &TempDir,
) -> RecordStore {
    RecordStore::new(
        names,
        Arc::new(StaticToken::new(TOKEN).unwrap()),
        backend.clone(),
        &store_options(temp_dir),
    )
    .unwrap()
    .with_clock(clock.clone())
}

/// Two `orders` shards (`wb-a`, `wb-b`) plus an unrelated `archive` one.
///
/// `wb-a` holds Ada and Bob, `wb-b` holds Cy.
pub fn orders_backend() -> Arc<MockBackend> {
    let backend = MockBackend::new()
        .with_workbook("orders", "wb-a")
        .with_workbook("archive", "wb-x")
        .with_workbook("orders", "wb-b");
    backend.seed_rows(
        "wb-a",
        SHEET,
        vec![
            json!({"name": "Ada", "team": "red"}),
            json!({"name": "Bob", "team": "blue"}),
        ],
    );
    backend.seed_rows("wb-b", SHEET, vec![json!({"name": "Cy", "team": "red"})]);
    backend.seed_rows("wb-x", SHEET, vec![json!({"name": "Zed", "team": "red"})]);
    Arc::new(backend)
}

pub struct Harness {
    pub temp_dir: TempDir,
    pub backend: Arc<MockBackend>,
    pub clock: Arc<ManualClock>,
    pub store: RecordStore,
}

impl Harness {
    pub fn orders() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let backend = orders_backend();
        let clock = Arc::new(ManualClock::new(START));
        let store = open_store(&["orders"], &backend, &clock, &temp_dir);
        Self {
            temp_dir,
            backend,
            clock,
            store,
        }
    }

    /// Resolve shards up front and forget the listing call.
    pub fn warmed(self) -> Self {
        self.store.shards().unwrap();
        self.backend.clear_calls();
        self
    }
}
