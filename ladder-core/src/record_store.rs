//! Record persistence seam
//!
//! The engine never touches storage directly; it goes through `RecordStore`.
//! Backends only need per-row get/upsert/delete and an unsorted epoch scan;
//! sorted scans fall back to an in-memory sort unless the backend can do
//! better.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::error::StoreError;
use crate::types::{Direction, LeaderboardRecord, RankKey, SortOrder};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Sorted scan over one epoch, strictly after/before an optional anchor.
#[derive(Debug, Clone)]
pub struct ScanRequest<'a> {
    pub leaderboard_id: &'a str,
    pub expiry: i64,
    pub order: SortOrder,
    pub anchor: Option<&'a RankKey>,
    pub direction: Direction,
    pub limit: usize,
}

pub trait RecordStore: Send + Sync {
    fn get(&self, leaderboard_id: &str, expiry: i64, owner_id: &str)
        -> StoreResult<Option<LeaderboardRecord>>;

    /// Records for the given owners; owners without a record are skipped.
    fn get_many(
        &self,
        leaderboard_id: &str,
        expiry: i64,
        owner_ids: &[String],
    ) -> StoreResult<Vec<LeaderboardRecord>> {
        let mut out = Vec::with_capacity(owner_ids.len());
        for owner in owner_ids {
            if let Some(record) = self.get(leaderboard_id, expiry, owner)? {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Insert or replace the record keyed by (id, expiry, owner).
    fn upsert(&self, record: &LeaderboardRecord) -> StoreResult<()>;

    fn delete(&self, leaderboard_id: &str, expiry: i64, owner_id: &str) -> StoreResult<bool>;

    /// Purge every epoch of a leaderboard. Returns rows removed.
    fn delete_all(&self, leaderboard_id: &str) -> StoreResult<u64>;

    /// All rows of one epoch, in no particular order.
    fn scan_epoch(&self, leaderboard_id: &str, expiry: i64) -> StoreResult<Vec<LeaderboardRecord>>;

    /// Up to `limit` rows in rank order, strictly past the anchor.
    fn scan_sorted(&self, request: &ScanRequest<'_>) -> StoreResult<Vec<LeaderboardRecord>> {
        let rows = self.scan_epoch(request.leaderboard_id, request.expiry)?;
        Ok(sort_and_slice(rows, request))
    }

    fn count(&self, leaderboard_id: &str, expiry: i64) -> StoreResult<u64> {
        Ok(self.scan_epoch(leaderboard_id, expiry)?.len() as u64)
    }
}

/// Order `rows` by rank and cut the page described by `request`. The result
/// is always in rank order, including for backward scans.
pub fn sort_and_slice(
    mut rows: Vec<LeaderboardRecord>,
    request: &ScanRequest<'_>,
) -> Vec<LeaderboardRecord> {
    let order = request.order;
    rows.sort_by(|a, b| order.compare(&a.rank_key(), &b.rank_key()));

    let Some(anchor) = request.anchor else {
        rows.truncate(request.limit);
        return rows;
    };
    match request.direction {
        Direction::Forward => rows
            .into_iter()
            .filter(|r| order.compare(&r.rank_key(), anchor).is_gt())
            .take(request.limit)
            .collect(),
        Direction::Backward => {
            let end = rows.partition_point(|r| order.compare(&r.rank_key(), anchor).is_lt());
            let start = end.saturating_sub(request.limit);
            rows.truncate(end);
            rows.drain(..start);
            rows
        }
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

type EpochRows = BTreeMap<(i64, String), LeaderboardRecord>;

/// Lock-protected map backend for tests and diskless deployments.
#[derive(Default)]
pub struct MemoryRecordStore {
    rows: RwLock<HashMap<String, EpochRows>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(
        &self,
        leaderboard_id: &str,
        expiry: i64,
        owner_id: &str,
    ) -> StoreResult<Option<LeaderboardRecord>> {
        Ok(self
            .rows
            .read()
            .get(leaderboard_id)
            .and_then(|rows| rows.get(&(expiry, owner_id.to_string())))
            .cloned())
    }

    fn upsert(&self, record: &LeaderboardRecord) -> StoreResult<()> {
        let mut stored = record.clone();
        stored.rank = None;
        self.rows
            .write()
            .entry(record.leaderboard_id.clone())
            .or_default()
            .insert((record.epoch_expiry(), record.owner_id.clone()), stored);
        Ok(())
    }

    fn delete(&self, leaderboard_id: &str, expiry: i64, owner_id: &str) -> StoreResult<bool> {
        Ok(self
            .rows
            .write()
            .get_mut(leaderboard_id)
            .and_then(|rows| rows.remove(&(expiry, owner_id.to_string())))
            .is_some())
    }

    fn delete_all(&self, leaderboard_id: &str) -> StoreResult<u64> {
        Ok(self
            .rows
            .write()
            .remove(leaderboard_id)
            .map(|rows| rows.len() as u64)
            .unwrap_or(0))
    }

    fn scan_epoch(&self, leaderboard_id: &str, expiry: i64) -> StoreResult<Vec<LeaderboardRecord>> {
        let rows = self.rows.read();
        let Some(rows) = rows.get(leaderboard_id) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .range((expiry, String::new())..)
            .take_while(|((e, _), _)| *e == expiry)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn count(&self, leaderboard_id: &str, expiry: i64) -> StoreResult<u64> {
        let rows = self.rows.read();
        Ok(rows
            .get(leaderboard_id)
            .map(|rows| {
                rows.range((expiry, String::new())..)
                    .take_while(|((e, _), _)| *e == expiry)
                    .count() as u64
            })
            .unwrap_or(0))
    }
}
