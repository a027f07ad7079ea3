//! Error taxonomy for the ranking engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RankingError>;

/// Failures surfaced to callers of the ranking engine.
#[derive(Debug, Error)]
pub enum RankingError {
    /// Unknown leaderboard, tournament, record or owner.
    #[error("{0} not found")]
    NotFound(String),

    /// Bad enum string, bad cron expression, out-of-range limit,
    /// malformed cursor or mismatched expiry override.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A rank-dependent operation was attempted while ranks are off.
    #[error("ranks are disabled for leaderboard {0}")]
    RanksDisabled(String),

    #[error("rank {rank} is out of range (leaderboard has {count} entries)")]
    OutOfRange { rank: i64, count: i64 },

    #[error("maximum number of score attempts exceeded")]
    AttemptsExceeded,

    #[error("tournament {0} must be joined before submitting scores")]
    JoinRequired(String),

    #[error("tournament {0} has reached its maximum size")]
    TournamentFull(String),

    #[error("tournament {0} is not active")]
    TournamentNotActive(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl RankingError {
    pub fn not_found(what: impl Into<String>) -> Self {
        RankingError::NotFound(what.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        RankingError::InvalidArgument(reason.into())
    }
}

/// Failures raised by record/config persistence backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("encoding error: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts() {
        let err: RankingError = StoreError::Backend("disk full".into()).into();
        assert!(matches!(err, RankingError::Storage(_)));
        assert_eq!(err.to_string(), "storage error: backend error: disk full");
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            RankingError::not_found("leaderboard L1").to_string(),
            "leaderboard L1 not found"
        );
        assert_eq!(
            RankingError::OutOfRange { rank: 9, count: 3 }.to_string(),
            "rank 9 is out of range (leaderboard has 3 entries)"
        );
    }
}
