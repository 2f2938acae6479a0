//! Single-target writes with full-shard avoidance.

use sheetshard_protocol::ShardRequest;
use tracing::{debug, info};

use crate::error::ShardResult;

use super::query::InsertQuery;
use super::RecordStore;

impl RecordStore {
    /// Append rows to the first shard that accepts them.
    ///
    /// Shards are tried in order. A shard with a fresh full marker is
    /// skipped without being contacted; a shard that answers with a
    /// capacity-exceeded code is marked full and the next one is tried. Any
    /// other reported failure stops the walk with an error.
    ///
    /// Returns `false` when no shard had room.
    pub fn insert(&self, query: &InsertQuery) -> ShardResult<bool> {
        let (table, data) = query.validate()?;
        let shards = self.shards()?;

        let request = ShardRequest::add(table, data);
        let template = self.authorized(&request)?;

        for (attempt, shard) in shards.iter().enumerate() {
            if self.ledger.is_avoided(shard)? {
                debug!(shard = %shard, attempt, "skipping full shard");
                continue;
            }

            let response = self.send_raw(shard, &template)?;
            if response.capacity_exceeded() {
                self.ledger.mark_full(shard)?;
                continue;
            }
            response.ensure_success()?;

            debug!(shard = %shard, table, attempt, "insert accepted");
            return Ok(true);
        }

        info!(table, shards = shards.len(), "no shard had room for the insert");
        Ok(false)
    }
}
