//! Sheetshard cache store
//!
//! Durable key-value tables partitioned by namespace:
//! - One JSON object file per (namespace, table)
//! - One lock marker file per (namespace, table) while a writer holds it
//! - Directory layout: <root>/<namespace>/<table>.json
//!
//! ## Locking
//!
//! Writers (`set`, `delete`, `drop_table`) serialize on the table's lock
//! marker. Readers never take the lock; table files are replaced by rename
//! so a reader observes either the previous or the next snapshot.

mod error;
mod lock;
mod namespace;
mod store;

pub use error::{CacheError, CacheResult};
pub use lock::{LockError, LockOptions, LockResult, TableLock};
pub use namespace::{table_file_stem, Namespace};
pub use store::{CacheConfig, CacheLookup, CacheStore, Removal};
