//! Fan-out reads.

use sheetshard_protocol::{ShardRequest, ShardResponse};
use tracing::debug;

use crate::error::ShardResult;
use crate::shard::ShardRecord;

use super::query::SelectQuery;
use super::RecordStore;

impl RecordStore {
    /// Fetch matching rows from every shard.
    ///
    /// Rows are concatenated in shard order, each shard's rows in the order
    /// it returned them, and tagged with their shard. Rows are not
    /// deduplicated across shards. Any shard reporting failure fails the
    /// whole call.
    pub fn select(&self, query: &SelectQuery) -> ShardResult<Vec<ShardRecord>> {
        let (table, criteria) = query.validate()?;
        let shards = self.shards()?;

        let request = ShardRequest::fetch(table, criteria, &query.columns);
        let responses = self.fan_out(&shards, &request)?;

        let mut merged = Vec::new();
        for (shard, response) in shards.iter().zip(responses) {
            let records = ShardResponse::parse(&response.body)?
                .ensure_success()?
                .into_records()?;
            debug!(shard = %shard, table, count = records.len(), "shard returned records");
            merged.extend(
                records
                    .into_iter()
                    .map(|fields| ShardRecord::new(shard.clone(), fields)),
            );
        }
        Ok(merged)
    }
}
