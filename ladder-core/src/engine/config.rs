use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on `limit` for record listings.
    pub max_list_limit: usize,
    /// Upper bound on `limit` for owner-centred listings.
    pub max_haystack_limit: usize,
    pub scheduler_interval_secs: u64,
    pub rank_cache_seed: u64,
    /// Number of mutexes serializing read-modify-write per (leaderboard, owner).
    pub write_lock_stripes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_list_limit: 10_000,
            max_haystack_limit: 100,
            scheduler_interval_secs: 30,
            rank_cache_seed: 42,
            write_lock_stripes: 64,
        }
    }
}
