//! Ladder Server Library
//!
//! HTTP front end for the ladder ranking engine:
//! - JSON-over-HTTP leaderboard and tournament endpoints (axum)
//! - LMDB persistence for records and configs (heed + bincode)
//! - Environment-driven server configuration
//! - Request and ranking metrics (Prometheus + JSON export)
//! - Periodic reset scheduler task

pub mod api;
pub mod config;
pub mod metrics;
pub mod scheduler;
pub mod storage;

pub use api::{build_router, ApiState};
pub use config::ServerConfig;
pub use metrics::ServerMetrics;
pub use storage::lmdb_store::{LmdbStore, LmdbStoreError};
