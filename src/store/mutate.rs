//! Criteria-wide writes: update and delete.

use sheetshard_protocol::{ShardRequest, ShardResponse};
use tracing::debug;

use crate::error::ShardResult;
use crate::shard::ShardId;

use super::query::{DeleteQuery, UpdateQuery};
use super::RecordStore;

impl RecordStore {
    /// Update rows matching the criteria.
    ///
    /// With an explicit shard, only that shard is contacted. Otherwise every
    /// shard is, and the result is true if any shard changed at least one
    /// row. Failure status is checked before the affected-row count.
    pub fn update(&self, query: &UpdateQuery) -> ShardResult<bool> {
        let (table, criteria, data) = query.validate()?;
        let request = ShardRequest::update(table, criteria, data);

        if let Some(shard) = query.target() {
            let response = self.send(&shard, &request)?;
            return Ok(response.affected_rows()? >= 1);
        }

        let shards = self.shards()?;
        let mut applied = false;
        for (shard, response) in shards.iter().zip(self.fan_out(&shards, &request)?) {
            let response = ShardResponse::parse(&response.body)?.ensure_success()?;
            let affected = response.affected_rows()?;
            debug!(shard = %shard, table, affected, "update applied");
            if affected >= 1 {
                applied = true;
            }
        }
        Ok(applied)
    }

    /// Delete rows matching the criteria (optionally one row index).
    ///
    /// Targeting and result follow `update`. Every shard that deleted at
    /// least one row has its full marker cleared afterwards.
    pub fn delete(&self, query: &DeleteQuery) -> ShardResult<bool> {
        let (table, criteria) = query.validate()?;
        let request = ShardRequest::delete(table, criteria, query.row_id);

        let mut affected: Vec<ShardId> = Vec::new();
        if let Some(shard) = query.target() {
            let response = self.send(&shard, &request)?;
            if response.rows_deleted()? >= 1 {
                affected.push(shard);
            }
        } else {
            let shards = self.shards()?;
            for (shard, response) in shards.iter().zip(self.fan_out(&shards, &request)?) {
                let response = ShardResponse::parse(&response.body)?.ensure_success()?;
                let deleted = response.rows_deleted()?;
                debug!(shard = %shard, table, deleted, "delete applied");
                if deleted >= 1 && !affected.contains(shard) {
                    affected.push(shard.clone());
                }
            }
        }

        for shard in &affected {
            self.ledger.clear(shard)?;
        }
        Ok(!affected.is_empty())
    }
}
