//! Ladder - Leaderboard & Tournament Ranking Core
//!
//! This crate provides the ranking engine behind the ladder server:
//! - Leaderboard/tournament config catalog with idempotent creation
//! - Rank cache (per leaderboard epoch, O(log n) rank and select)
//! - Score merge operators (best, set, increment, decrement)
//! - Cron-driven epoch resets and tournament windows
//! - Opaque, versioned pagination cursors
//! - Record persistence seam with an in-memory backend

pub mod config_store;
pub mod cron;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod logging;
pub mod operator;
pub mod rank_cache;
pub mod record_store;
pub mod scheduler;
pub mod types;

pub use config_store::{CatalogPage, ConfigRepo, ConfigStore, EphemeralConfigRepo};
pub use cron::{CronClock, CronSchedule, ManualClock, SystemClock, WallClock};
pub use cursor::{CatalogCursor, CursorError, RecordCursor};
pub use engine::{EngineConfig, RankingEngine};
pub use error::{RankingError, Result, StoreError};
pub use rank_cache::RankCache;
pub use record_store::{MemoryRecordStore, RecordStore, ScanRequest, StoreResult};
pub use scheduler::{ActiveWindow, EpochState, ResetScheduler, RolloverEvent, RolloverListener};
pub use types::{
    DecrementFloor, Direction, Epoch, LeaderboardConfig, LeaderboardRecord, Operator,
    OverrideOperator, RankKey, SortOrder, TournamentSettings,
};
