use serde::{Deserialize, Serialize};

use crate::types::{LeaderboardRecord, OverrideOperator};

// =====================================================
// Requests
// =====================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteRecord {
    pub leaderboard_id: String,
    pub owner_id: String,
    pub username: Option<String>,
    pub score: i64,
    pub subscore: i64,
    /// `None` leaves stored metadata untouched.
    pub metadata: Option<Vec<u8>>,
    pub override_operator: OverrideOperator,
}

impl WriteRecord {
    pub fn new(leaderboard_id: impl Into<String>, owner_id: impl Into<String>, score: i64) -> Self {
        Self {
            leaderboard_id: leaderboard_id.into(),
            owner_id: owner_id.into(),
            score,
            ..Default::default()
        }
    }

    pub fn with_subscore(mut self, subscore: i64) -> Self {
        self.subscore = subscore;
        self
    }

    pub fn with_operator(mut self, operator: OverrideOperator) -> Self {
        self.override_operator = operator;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRecords {
    pub leaderboard_id: String,
    pub owner_ids: Vec<String>,
    pub limit: usize,
    pub cursor: Option<String>,
    /// 0 = current epoch.
    pub override_expiry: i64,
}

impl ListRecords {
    pub fn new(leaderboard_id: impl Into<String>, limit: usize) -> Self {
        Self {
            leaderboard_id: leaderboard_id.into(),
            limit,
            ..Default::default()
        }
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_expiry(mut self, expiry: i64) -> Self {
        self.override_expiry = expiry;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HaystackQuery {
    pub leaderboard_id: String,
    pub owner_id: String,
    pub limit: usize,
    pub cursor: Option<String>,
    pub override_expiry: i64,
}

/// Catalog filter for tournaments. Zero bounds are open.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentFilter {
    pub category_start: u8,
    pub category_end: u8,
    pub start_time: i64,
    pub end_time: i64,
    pub limit: usize,
    pub cursor: Option<String>,
}

impl Default for TournamentFilter {
    fn default() -> Self {
        Self {
            category_start: 0,
            category_end: crate::types::MAX_CATEGORY,
            start_time: 0,
            end_time: 0,
            limit: 10,
            cursor: None,
        }
    }
}

// =====================================================
// Responses
// =====================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordPage {
    pub records: Vec<LeaderboardRecord>,
    pub owner_records: Vec<LeaderboardRecord>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub rank_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentStatus {
    pub id: String,
    pub active: bool,
    pub can_enter: bool,
    /// Active window of the current epoch.
    pub start_active: i64,
    pub end_active: i64,
    /// End of the current epoch, if it ends.
    pub expiry_time: Option<i64>,
    pub prev_reset: i64,
    pub next_reset: Option<i64>,
    pub size: u64,
    pub max_size: u32,
    /// Whether the asking owner has a record this epoch.
    pub joined: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStats {
    pub leaderboards: usize,
    pub tournaments: usize,
    pub rank_buckets: usize,
    pub cache_rebuilds: u64,
    pub record_writes: u64,
    pub cache_write_failures: u64,
}
