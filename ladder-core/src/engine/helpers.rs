use parking_lot::{Mutex, MutexGuard};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::cursor::RecordCursor;
use crate::error::{RankingError, Result};
use crate::types::RankKey;

/// Striped mutexes serializing read-modify-write per (leaderboard, owner).
pub(crate) struct OwnerLocks {
    stripes: Vec<Mutex<()>>,
}

impl OwnerLocks {
    pub(crate) fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub(crate) fn lock(&self, leaderboard_id: &str, owner_id: &str) -> MutexGuard<'_, ()> {
        let mut hasher = DefaultHasher::new();
        leaderboard_id.hash(&mut hasher);
        owner_id.hash(&mut hasher);
        let stripe = (hasher.finish() % self.stripes.len() as u64) as usize;
        self.stripes[stripe].lock()
    }
}

pub(crate) fn check_limit(limit: usize, max: usize) -> Result<()> {
    if limit == 0 || limit > max {
        return Err(RankingError::invalid(format!(
            "limit must be between 1 and {max}"
        )));
    }
    Ok(())
}

pub(crate) fn check_owner(owner_id: &str) -> Result<()> {
    if owner_id.is_empty() {
        return Err(RankingError::invalid("owner id must not be empty"));
    }
    Ok(())
}

pub(crate) fn encode_cursor(
    leaderboard_id: &str,
    expiry: i64,
    key: &RankKey,
    rank: Option<i64>,
    is_next: bool,
) -> String {
    RecordCursor {
        is_next,
        leaderboard_id: leaderboard_id.to_string(),
        expiry,
        owner_id: key.owner_id.clone(),
        score: key.score,
        subscore: key.subscore,
        rank,
    }
    .encode()
}
