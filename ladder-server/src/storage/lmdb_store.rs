//! LMDB Store - persistent records and leaderboard configs
//!
//! One LMDB environment, two named databases:
//! ```text
//! records : [leaderboard id][0x00][expiry, sign-flipped BE][owner id] → bincode(LeaderboardRecord)
//! configs : [leaderboard id]                                         → bincode(LeaderboardConfig)
//! ```
//!
//! Leaderboard ids never contain NUL, so `id 0x00` is an unambiguous prefix
//! for every epoch of one leaderboard and `id 0x00 expiry` for one epoch.
//! Flipping the sign bit keeps expiries in numeric order under LMDB's
//! lexicographic key comparison.
//!
//! Sorted scans read the whole epoch by prefix and sort in memory; the rank
//! cache serves ranked reads, so scans only run on rebuilds and on
//! leaderboards with ranks disabled.

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use ladder_core::{ConfigRepo, LeaderboardConfig, LeaderboardRecord, RecordStore, StoreError, StoreResult};

#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for StoreError {
    fn from(e: LmdbStoreError) -> Self {
        match e {
            LmdbStoreError::Serialization(e) => StoreError::Encoding(e.to_string()),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

type LmdbResult<T> = Result<T, LmdbStoreError>;

/// Row counts per database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LmdbStoreStats {
    pub records: u64,
    pub configs: u64,
}

/// LMDB-backed `RecordStore` + `ConfigRepo`.
#[derive(Clone)]
pub struct LmdbStore {
    env: Arc<Env>,
    records: Database<Bytes, Bytes>,
    configs: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Open or create the store.
    ///
    /// `max_size` must be a multiple of the OS page size.
    pub fn new<P: AsRef<Path>>(path: P, max_size: usize) -> LmdbResult<Self> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size)
                .max_dbs(2)
                .open(path.as_ref())?
        };

        let mut wtxn = env.write_txn()?;
        let records = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("records"))?;
        let configs = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("configs"))?;
        wtxn.commit()?;

        info!(
            path = %path.as_ref().display(),
            max_size_mb = max_size / (1024 * 1024),
            "LMDB store opened"
        );

        Ok(Self {
            env: Arc::new(env),
            records,
            configs,
        })
    }

    pub fn stats(&self) -> LmdbResult<LmdbStoreStats> {
        let rtxn = self.env.read_txn()?;
        Ok(LmdbStoreStats {
            records: self.records.len(&rtxn)?,
            configs: self.configs.len(&rtxn)?,
        })
    }

    /// Flush to disk (explicit fsync).
    pub fn sync(&self) -> LmdbResult<()> {
        self.env.force_sync()?;
        debug!("LMDB synced to disk");
        Ok(())
    }

    fn read_record(&self, key: &[u8]) -> LmdbResult<Option<LeaderboardRecord>> {
        let rtxn = self.env.read_txn()?;
        match self.records.get(&rtxn, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn read_epoch(&self, leaderboard_id: &str, expiry: i64) -> LmdbResult<Vec<LeaderboardRecord>> {
        let prefix = epoch_prefix(leaderboard_id, expiry);
        let rtxn = self.env.read_txn()?;
        let mut rows = Vec::new();
        for entry in self.records.prefix_iter(&rtxn, &prefix)? {
            let (_, bytes) = entry?;
            rows.push(bincode::deserialize(bytes)?);
        }
        Ok(rows)
    }

    fn count_epoch(&self, leaderboard_id: &str, expiry: i64) -> LmdbResult<u64> {
        let prefix = epoch_prefix(leaderboard_id, expiry);
        let rtxn = self.env.read_txn()?;
        let mut count = 0;
        for entry in self.records.prefix_iter(&rtxn, &prefix)? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    fn write_record(&self, record: &LeaderboardRecord) -> LmdbResult<()> {
        let mut stored = record.clone();
        stored.rank = None;
        let bytes = bincode::serialize(&stored)?;
        let key = record_key(&record.leaderboard_id, record.epoch_expiry(), &record.owner_id);
        let mut wtxn = self.env.write_txn()?;
        self.records.put(&mut wtxn, &key, &bytes)?;
        wtxn.commit()?;
        Ok(())
    }

    fn remove_record(&self, key: &[u8]) -> LmdbResult<bool> {
        let mut wtxn = self.env.write_txn()?;
        let removed = self.records.delete(&mut wtxn, key)?;
        wtxn.commit()?;
        Ok(removed)
    }

    fn remove_leaderboard(&self, leaderboard_id: &str) -> LmdbResult<u64> {
        let prefix = leaderboard_prefix(leaderboard_id);
        let mut wtxn = self.env.write_txn()?;
        let mut keys = Vec::new();
        for entry in self.records.prefix_iter(&wtxn, &prefix)? {
            let (key, _) = entry?;
            keys.push(key.to_vec());
        }
        for key in &keys {
            self.records.delete(&mut wtxn, key)?;
        }
        wtxn.commit()?;
        Ok(keys.len() as u64)
    }

    fn read_configs(&self) -> LmdbResult<Vec<LeaderboardConfig>> {
        let rtxn = self.env.read_txn()?;
        let mut configs = Vec::new();
        for entry in self.configs.iter(&rtxn)? {
            let (_, bytes) = entry?;
            configs.push(bincode::deserialize(bytes)?);
        }
        Ok(configs)
    }

    fn write_config(&self, config: &LeaderboardConfig) -> LmdbResult<()> {
        let bytes = bincode::serialize(config)?;
        let mut wtxn = self.env.write_txn()?;
        self.configs.put(&mut wtxn, config.id.as_bytes(), &bytes)?;
        wtxn.commit()?;
        Ok(())
    }

    fn remove_config(&self, id: &str) -> LmdbResult<()> {
        let mut wtxn = self.env.write_txn()?;
        self.configs.delete(&mut wtxn, id.as_bytes())?;
        wtxn.commit()?;
        Ok(())
    }
}

// ============================================================================
// Key layout
// ============================================================================

fn leaderboard_prefix(leaderboard_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(leaderboard_id.len() + 1);
    key.extend_from_slice(leaderboard_id.as_bytes());
    key.push(0);
    key
}

fn epoch_prefix(leaderboard_id: &str, expiry: i64) -> Vec<u8> {
    let mut key = leaderboard_prefix(leaderboard_id);
    key.extend_from_slice(&((expiry as u64) ^ (1 << 63)).to_be_bytes());
    key
}

fn record_key(leaderboard_id: &str, expiry: i64, owner_id: &str) -> Vec<u8> {
    let mut key = epoch_prefix(leaderboard_id, expiry);
    key.extend_from_slice(owner_id.as_bytes());
    key
}

// ============================================================================
// Trait impls
// ============================================================================

impl RecordStore for LmdbStore {
    fn get(
        &self,
        leaderboard_id: &str,
        expiry: i64,
        owner_id: &str,
    ) -> StoreResult<Option<LeaderboardRecord>> {
        Ok(self.read_record(&record_key(leaderboard_id, expiry, owner_id))?)
    }

    fn upsert(&self, record: &LeaderboardRecord) -> StoreResult<()> {
        Ok(self.write_record(record)?)
    }

    fn delete(&self, leaderboard_id: &str, expiry: i64, owner_id: &str) -> StoreResult<bool> {
        Ok(self.remove_record(&record_key(leaderboard_id, expiry, owner_id))?)
    }

    fn delete_all(&self, leaderboard_id: &str) -> StoreResult<u64> {
        Ok(self.remove_leaderboard(leaderboard_id)?)
    }

    fn scan_epoch(&self, leaderboard_id: &str, expiry: i64) -> StoreResult<Vec<LeaderboardRecord>> {
        Ok(self.read_epoch(leaderboard_id, expiry)?)
    }

    fn count(&self, leaderboard_id: &str, expiry: i64) -> StoreResult<u64> {
        Ok(self.count_epoch(leaderboard_id, expiry)?)
    }
}

impl ConfigRepo for LmdbStore {
    fn load_all(&self) -> StoreResult<Vec<LeaderboardConfig>> {
        Ok(self.read_configs()?)
    }

    fn put(&self, config: &LeaderboardConfig) -> StoreResult<()> {
        Ok(self.write_config(config)?)
    }

    fn delete(&self, id: &str) -> StoreResult<()> {
        Ok(self.remove_config(id)?)
    }
}
