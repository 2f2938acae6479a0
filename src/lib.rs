//! Sheetshard - one logical table store spread across spreadsheet workbooks
//!
//! Each configured workbook name may match several workbooks (shards) on the
//! backend. The record store resolves them once, caches the list on disk,
//! and then:
//! - reads by fanning out to every shard and merging the rows
//! - inserts into the first shard with room, remembering full ones
//! - updates and deletes on one shard or on all of them

pub mod auth;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod logging;
pub mod mock;
pub mod shard;
pub mod store;
pub mod transport;

pub use auth::{OAuthCredentials, OAuthTokenProvider, StaticToken, TokenProvider};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EffectiveConfig, Settings};
pub use directory::ShardDirectory;
pub use error::{ShardError, ShardResult};
pub use shard::{ShardId, ShardRecord};
pub use store::{
    escape, DeleteQuery, FullShardLedger, InsertQuery, RecordStore, SelectQuery, StoreOptions,
    UpdateQuery,
};
pub use transport::{HttpTransport, Transport, TransportError};
