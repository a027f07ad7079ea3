//! Rank Cache - in-memory ordered index per (leaderboard, epoch)
//!
//! ## Architecture
//! ```text
//! RankCache
//!   ├── disabled: {leaderboard ids with ranks off}
//!   └── buckets: leaderboard id → expiry → Arc<RwLock<RankBucket>>
//!                                             ├── SkipList (rank/select in O(log n))
//!                                             └── owner → current RankKey
//! ```
//!
//! The outer map lock is only held long enough to find or insert a bucket;
//! all ranking work happens under the bucket's own lock, so hot leaderboards
//! never serialize against unrelated ones.
//!
//! Buckets are built lazily: `prepare` loads an epoch's rows from the record
//! store the first time the bucket is touched after creation, re-enable or a
//! process restart.

mod skiplist;

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{RankingError, Result};
use crate::types::{Direction, RankKey, SortOrder};
use self::skiplist::SkipList;

type BucketRef = Arc<RwLock<RankBucket>>;

/// Ordered index for a single epoch of a single leaderboard.
#[derive(Debug)]
pub struct RankBucket {
    list: SkipList,
    owners: HashMap<String, RankKey>,
    built: bool,
}

impl RankBucket {
    fn new(order: SortOrder, seed: u64) -> Self {
        Self {
            list: SkipList::new(order, seed),
            owners: HashMap::new(),
            built: false,
        }
    }

    fn upsert(&mut self, key: RankKey) {
        if let Some(old) = self.owners.get(&key.owner_id) {
            if *old == key {
                return;
            }
            let old = old.clone();
            self.list.remove(&old);
        }
        self.owners.insert(key.owner_id.clone(), key.clone());
        self.list.insert(key);
    }

    fn remove(&mut self, owner_id: &str) -> bool {
        match self.owners.remove(owner_id) {
            Some(key) => self.list.remove(&key),
            None => false,
        }
    }

    fn contains(&self, key: &RankKey) -> bool {
        self.owners.get(&key.owner_id) == Some(key)
    }

    fn rank(&self, owner_id: &str) -> Option<i64> {
        let key = self.owners.get(owner_id)?;
        self.list.rank_of(key).map(|r| r as i64)
    }

    fn len(&self) -> i64 {
        self.list.len() as i64
    }

    fn window(&self, first: i64, last: i64) -> RankWindow {
        let total = self.len();
        let entries = if last >= first && first >= 1 {
            self.list
                .range(first as usize, (last - first + 1) as usize)
                .into_iter()
                .map(|(rank, key)| RankedEntry {
                    rank: rank as i64,
                    key,
                })
                .collect()
        } else {
            Vec::new()
        };
        let shown = entries.len() as i64;
        RankWindow {
            entries,
            total,
            has_before: first > 1 && total > 0,
            has_after: first - 1 + shown < total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    pub rank: i64,
    pub key: RankKey,
}

/// A contiguous slice of an epoch's ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankWindow {
    pub entries: Vec<RankedEntry>,
    /// Entries in the whole epoch.
    pub total: i64,
    pub has_before: bool,
    pub has_after: bool,
}

pub struct RankCache {
    buckets: RwLock<HashMap<String, HashMap<i64, BucketRef>>>,
    disabled: RwLock<HashSet<String>>,
    seeds: AtomicU64,
}

impl Default for RankCache {
    fn default() -> Self {
        Self::new(0x5EED_1ADD_E500_0001)
    }
}

impl RankCache {
    pub fn new(seed: u64) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            disabled: RwLock::new(HashSet::new()),
            seeds: AtomicU64::new(seed),
        }
    }

    pub fn is_enabled(&self, leaderboard_id: &str) -> bool {
        !self.disabled.read().contains(leaderboard_id)
    }

    fn check_enabled(&self, leaderboard_id: &str) -> Result<()> {
        if self.is_enabled(leaderboard_id) {
            Ok(())
        } else {
            Err(RankingError::RanksDisabled(leaderboard_id.to_string()))
        }
    }

    /// Turn ranks off and free every epoch's structure. Idempotent.
    pub fn disable(&self, leaderboard_id: &str) -> bool {
        let newly = self.disabled.write().insert(leaderboard_id.to_string());
        let freed = self
            .buckets
            .write()
            .remove(leaderboard_id)
            .map(|epochs| epochs.len())
            .unwrap_or(0);
        if newly {
            info!(leaderboard = leaderboard_id, freed, "rank cache disabled");
        }
        newly
    }

    /// Turn ranks back on. Buckets rebuild from the record store on next use.
    pub fn enable(&self, leaderboard_id: &str) {
        self.buckets.write().remove(leaderboard_id);
        if self.disabled.write().remove(leaderboard_id) {
            info!(leaderboard = leaderboard_id, "rank cache enabled");
        }
    }

    /// Forget everything about a leaderboard (config deleted).
    pub fn drop_all(&self, leaderboard_id: &str) {
        self.buckets.write().remove(leaderboard_id);
        self.disabled.write().remove(leaderboard_id);
        debug!(leaderboard = leaderboard_id, "rank cache dropped");
    }

    /// Number of live (leaderboard, epoch) buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().values().map(HashMap::len).sum()
    }

    fn lookup(&self, leaderboard_id: &str, expiry: i64) -> Option<BucketRef> {
        self.buckets
            .read()
            .get(leaderboard_id)
            .and_then(|epochs| epochs.get(&expiry))
            .cloned()
    }

    fn lookup_or_insert(&self, leaderboard_id: &str, expiry: i64, order: SortOrder) -> BucketRef {
        if let Some(bucket) = self.lookup(leaderboard_id, expiry) {
            return bucket;
        }
        let mut buckets = self.buckets.write();
        buckets
            .entry(leaderboard_id.to_string())
            .or_default()
            .entry(expiry)
            .or_insert_with(|| {
                let seed = self.seeds.fetch_add(1, Ordering::Relaxed);
                Arc::new(RwLock::new(RankBucket::new(order, seed)))
            })
            .clone()
    }

    /// Make sure the bucket exists and has been loaded. Returns `true` when
    /// this call performed the load. `loader` runs under the bucket's write
    /// lock, so concurrent users of the same bucket wait for it.
    pub fn prepare<F, E>(
        &self,
        leaderboard_id: &str,
        expiry: i64,
        order: SortOrder,
        loader: F,
    ) -> Result<bool>
    where
        F: FnOnce() -> std::result::Result<Vec<RankKey>, E>,
        RankingError: From<E>,
    {
        self.check_enabled(leaderboard_id)?;
        let bucket = self.lookup_or_insert(leaderboard_id, expiry, order);
        if bucket.read().built {
            return Ok(false);
        }
        let mut guard = bucket.write();
        if guard.built {
            return Ok(false);
        }
        let keys = loader()?;
        let loaded = keys.len();
        for key in keys {
            guard.upsert(key);
        }
        guard.built = true;
        debug!(leaderboard = leaderboard_id, expiry, loaded, "rank bucket built");
        Ok(true)
    }

    pub fn upsert(
        &self,
        leaderboard_id: &str,
        expiry: i64,
        order: SortOrder,
        owner_id: &str,
        score: i64,
        subscore: i64,
    ) -> Result<()> {
        self.check_enabled(leaderboard_id)?;
        let bucket = self.lookup_or_insert(leaderboard_id, expiry, order);
        bucket
            .write()
            .upsert(RankKey::new(score, subscore, owner_id));
        Ok(())
    }

    pub fn remove(&self, leaderboard_id: &str, expiry: i64, owner_id: &str) -> Result<bool> {
        self.check_enabled(leaderboard_id)?;
        Ok(self
            .lookup(leaderboard_id, expiry)
            .map(|bucket| bucket.write().remove(owner_id))
            .unwrap_or(false))
    }

    /// 1-based rank of an owner.
    pub fn get_rank(&self, leaderboard_id: &str, expiry: i64, owner_id: &str) -> Result<i64> {
        self.check_enabled(leaderboard_id)?;
        self.lookup(leaderboard_id, expiry)
            .and_then(|bucket| bucket.read().rank(owner_id))
            .ok_or_else(|| RankingError::not_found(format!("rank for owner {owner_id}")))
    }

    pub fn get_data_by_rank(&self, leaderboard_id: &str, expiry: i64, rank: i64) -> Result<RankKey> {
        self.check_enabled(leaderboard_id)?;
        let Some(bucket) = self.lookup(leaderboard_id, expiry) else {
            return Err(RankingError::OutOfRange { rank, count: 0 });
        };
        let bucket = bucket.read();
        if rank < 1 {
            return Err(RankingError::OutOfRange {
                rank,
                count: bucket.len(),
            });
        }
        bucket
            .list
            .get_by_rank(rank as usize)
            .cloned()
            .ok_or(RankingError::OutOfRange {
                rank,
                count: bucket.len(),
            })
    }

    pub fn count(&self, leaderboard_id: &str, expiry: i64) -> Result<i64> {
        self.check_enabled(leaderboard_id)?;
        Ok(self
            .lookup(leaderboard_id, expiry)
            .map(|bucket| bucket.read().len())
            .unwrap_or(0))
    }

    /// Up to `limit` entries from the start of the ordering, or strictly
    /// after/before an anchor key. The anchor need not be present.
    pub fn page(
        &self,
        leaderboard_id: &str,
        expiry: i64,
        anchor: Option<(&RankKey, Direction)>,
        limit: usize,
    ) -> Result<RankWindow> {
        self.check_enabled(leaderboard_id)?;
        let Some(bucket) = self.lookup(leaderboard_id, expiry) else {
            return Ok(RankWindow::default());
        };
        let bucket = bucket.read();
        let limit = limit as i64;
        let (first, last) = match anchor {
            None => (1, limit),
            Some((key, Direction::Forward)) => {
                let through = bucket.list.count_before(key) as i64 + i64::from(bucket.contains(key));
                (through + 1, through + limit)
            }
            Some((key, Direction::Backward)) => {
                let end = bucket.list.count_before(key) as i64;
                ((end - limit).max(0) + 1, end)
            }
        };
        Ok(bucket.window(first, last.min(bucket.len())))
    }

    /// Window of `limit` entries positioned around where `key` sorts: up to
    /// `limit / 2` entries before it, the rest from its position onward.
    /// When one side runs short the other side fills the window.
    pub fn around(
        &self,
        leaderboard_id: &str,
        expiry: i64,
        key: &RankKey,
        limit: usize,
    ) -> Result<RankWindow> {
        self.check_enabled(leaderboard_id)?;
        let Some(bucket) = self.lookup(leaderboard_id, expiry) else {
            return Ok(RankWindow::default());
        };
        let bucket = bucket.read();
        let limit = limit as i64;
        let total = bucket.len();
        let position = bucket.list.count_before(key) as i64;
        let before = position.min(limit / 2);
        let mut first = position - before + 1;
        let last = total.min(first + limit - 1);
        if last - first + 1 < limit {
            first = (last - limit + 1).max(1);
        }
        Ok(bucket.window(first, last))
    }
}
