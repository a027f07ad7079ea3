//! Ranking Engine: leaderboard and tournament operations
//!
//! Architecture:
//! ```text
//!   RecordWrite ──► ResetScheduler (current epoch)
//!                     │
//!                     ▼
//!                RecordStore.get ──► Operator merge ──► RecordStore.upsert
//!                                                          │
//!                                                          ▼
//!                                              RankCache.upsert (best effort)
//!
//!   RecordsList ──► epoch ──► RankCache.page ──► hydrate from RecordStore
//!                        └──► (ranks off) RecordStore.scan_sorted
//! ```
//!
//! Operation groups:
//!   1. Catalog     - create / get / list / delete configs, rank toggles
//!   2. Records     - write, delete
//!   3. Listing     - list, haystack, cursor-from-rank
//!   4. Tournaments - join, add attempt, status, list

pub mod config;
mod helpers;
mod listing;
pub mod messages;
mod ranking;
mod tournament;

pub use config::EngineConfig;
pub use messages::*;
pub use ranking::RankingEngine;
pub use tournament::{TournamentEntry, TournamentPage};

// =====================================================
// Tests
// =====================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cron::ManualClock;
    use crate::cursor::RecordCursor;
    use crate::error::RankingError;
    use crate::types::{LeaderboardConfig, Operator, OverrideOperator, SortOrder, TournamentSettings};
    use std::sync::Arc;

    const JAN_1_2024: i64 = 1_704_067_200;

    fn test_engine() -> (RankingEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(JAN_1_2024 + 60));
        let engine = RankingEngine::in_memory(EngineConfig::default()).with_clock(clock.clone());
        (engine, clock)
    }

    fn seed(engine: &RankingEngine, id: &str, scores: &[(&str, i64)]) {
        engine.create_leaderboard(LeaderboardConfig::new(id)).unwrap();
        for (owner, score) in scores {
            engine.record_write(WriteRecord::new(id, *owner, *score)).unwrap();
        }
    }

    #[test]
    fn test_write_returns_rank() {
        let (engine, _) = test_engine();
        seed(&engine, "L1", &[("A", 100), ("B", 50)]);
        let record = engine.record_write(WriteRecord::new("L1", "C", 75)).unwrap();
        assert_eq!(record.rank, Some(2));
        assert_eq!(record.num_score, 1);
        assert_eq!(record.create_time, JAN_1_2024 + 60);
    }

    #[test]
    fn test_write_to_unknown_leaderboard() {
        let (engine, _) = test_engine();
        assert!(matches!(
            engine.record_write(WriteRecord::new("missing", "A", 1)),
            Err(RankingError::NotFound(_))
        ));
        seed(&engine, "L1", &[]);
        assert!(matches!(
            engine.record_write(WriteRecord::new("L1", "", 1)),
            Err(RankingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_best_counts_attempts_on_ties() {
        let (engine, _) = test_engine();
        seed(&engine, "L1", &[("A", 10)]);
        let record = engine.record_write(WriteRecord::new("L1", "A", 10)).unwrap();
        assert_eq!(record.score, 10);
        assert_eq!(record.num_score, 2);
    }

    #[test]
    fn test_metadata_only_follows_winning_best_writes() {
        let (engine, _) = test_engine();
        seed(&engine, "L1", &[]);
        let mut first = WriteRecord::new("L1", "A", 10);
        first.metadata = Some(b"first".to_vec());
        engine.record_write(first).unwrap();

        let mut worse = WriteRecord::new("L1", "A", 5);
        worse.metadata = Some(b"worse".to_vec());
        assert_eq!(engine.record_write(worse).unwrap().metadata, b"first");

        let mut forced = WriteRecord::new("L1", "A", 5).with_operator(OverrideOperator::Use(Operator::Set));
        forced.metadata = Some(b"forced".to_vec());
        let record = engine.record_write(forced).unwrap();
        assert_eq!(record.score, 5);
        assert_eq!(record.metadata, b"forced");
    }

    #[test]
    fn test_record_delete() {
        let (engine, _) = test_engine();
        seed(&engine, "L1", &[("A", 100), ("B", 50)]);
        engine.record_delete("L1", "A").unwrap();
        assert!(matches!(
            engine.record_delete("L1", "A"),
            Err(RankingError::NotFound(_))
        ));
        let page = engine.records_list(ListRecords::new("L1", 10)).unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].rank, Some(1));
    }

    #[test]
    fn test_list_limits() {
        let (engine, _) = test_engine();
        seed(&engine, "L1", &[]);
        assert!(engine.records_list(ListRecords::new("L1", 0)).is_err());
        assert!(engine.records_list(ListRecords::new("L1", 10_001)).is_err());
        assert!(engine.records_list(ListRecords::new("L1", 10_000)).is_ok());
        let haystack = HaystackQuery {
            leaderboard_id: "L1".into(),
            owner_id: "A".into(),
            limit: 101,
            ..Default::default()
        };
        assert!(matches!(
            engine.records_haystack(haystack),
            Err(RankingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_cursor_for_other_leaderboard_is_not_found() {
        let (engine, _) = test_engine();
        seed(&engine, "L1", &[("A", 1), ("B", 2)]);
        seed(&engine, "L2", &[("A", 1), ("B", 2)]);
        let page = engine.records_list(ListRecords::new("L1", 1)).unwrap();
        let cursor = page.next_cursor.unwrap();
        assert!(matches!(
            engine.records_list(ListRecords::new("L2", 1).with_cursor(Some(cursor))),
            Err(RankingError::NotFound(_))
        ));
        assert!(matches!(
            engine.records_list(ListRecords::new("L1", 1).with_cursor(Some("bogus".into()))),
            Err(RankingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_prev_cursor_walks_back() {
        let (engine, _) = test_engine();
        seed(&engine, "L1", &[("A", 5), ("B", 4), ("C", 3), ("D", 2), ("E", 1)]);
        let first = engine.records_list(ListRecords::new("L1", 2)).unwrap();
        assert!(first.prev_cursor.is_none());
        let second = engine
            .records_list(ListRecords::new("L1", 2).with_cursor(first.next_cursor))
            .unwrap();
        let owners: Vec<&str> = second.records.iter().map(|r| r.owner_id.as_str()).collect();
        assert_eq!(owners, vec!["C", "D"]);

        let back = engine
            .records_list(ListRecords::new("L1", 2).with_cursor(second.prev_cursor))
            .unwrap();
        let owners: Vec<&str> = back.records.iter().map(|r| r.owner_id.as_str()).collect();
        assert_eq!(owners, vec!["A", "B"]);
        assert!(back.prev_cursor.is_none());
    }

    #[test]
    fn test_cursor_from_rank_encodes_previous_rank() {
        let (engine, _) = test_engine();
        seed(&engine, "L1", &[("A", 100), ("B", 50), ("C", 75)]);
        assert_eq!(engine.cursor_from_rank("L1", 1, 0).unwrap(), "");
        let token = engine.cursor_from_rank("L1", 3, 0).unwrap();
        let cursor = RecordCursor::decode(&token).unwrap();
        assert!(cursor.is_next);
        assert_eq!(cursor.owner_id, "C");
        assert_eq!(cursor.rank, Some(2));
        assert!(matches!(
            engine.cursor_from_rank("L1", 4, 0),
            Err(RankingError::OutOfRange { .. })
        ));
        assert!(engine.cursor_from_rank("L1", 0, 0).is_err());
    }

    #[test]
    fn test_enable_rebuilds_from_store() {
        let (engine, _) = test_engine();
        seed(&engine, "L1", &[("A", 100), ("B", 50)]);
        engine.disable_ranks("L1").unwrap();
        engine.record_write(WriteRecord::new("L1", "C", 75)).unwrap();
        assert!(matches!(
            engine.cursor_from_rank("L1", 2, 0),
            Err(RankingError::RanksDisabled(_))
        ));

        let before = engine.stats().cache_rebuilds;
        engine.enable_ranks("L1").unwrap();
        let page = engine.records_list(ListRecords::new("L1", 10)).unwrap();
        let ranks: Vec<Option<i64>> = page.records.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(page.records[1].owner_id, "C");
        assert_eq!(engine.stats().cache_rebuilds, before + 1);
    }

    #[test]
    fn test_ranks_disabled_at_creation() {
        let (engine, _) = test_engine();
        engine
            .create_leaderboard(LeaderboardConfig::new("quiet").with_ranks(false))
            .unwrap();
        let record = engine.record_write(WriteRecord::new("quiet", "A", 3)).unwrap();
        assert_eq!(record.rank, None);
        assert_eq!(engine.stats().rank_buckets, 0);
    }

    #[test]
    fn test_ascending_leaderboard() {
        let (engine, _) = test_engine();
        engine
            .create_leaderboard(
                LeaderboardConfig::new("speedrun")
                    .with_sort_order(SortOrder::Ascending)
                    .with_operator(Operator::Best),
            )
            .unwrap();
        for (owner, time) in [("A", 90), ("B", 60), ("C", 75)] {
            engine.record_write(WriteRecord::new("speedrun", owner, time)).unwrap();
        }
        engine.record_write(WriteRecord::new("speedrun", "A", 95)).unwrap();
        let page = engine.records_list(ListRecords::new("speedrun", 10)).unwrap();
        let rows: Vec<(&str, i64)> = page.records.iter().map(|r| (r.owner_id.as_str(), r.score)).collect();
        assert_eq!(rows, vec![("B", 60), ("C", 75), ("A", 90)]);
    }

    #[test]
    fn test_tournament_attempt_cap() {
        let (engine, _) = test_engine();
        let settings = TournamentSettings {
            start_time: JAN_1_2024,
            duration: 3600,
            max_num_score: 2,
            ..Default::default()
        };
        engine
            .create_tournament(LeaderboardConfig::new_tournament("t", settings))
            .unwrap();
        engine.record_write(WriteRecord::new("t", "A", 1)).unwrap();
        engine.record_write(WriteRecord::new("t", "A", 2)).unwrap();
        assert!(matches!(
            engine.record_write(WriteRecord::new("t", "A", 3)),
            Err(RankingError::AttemptsExceeded)
        ));
        let record = engine.tournament_add_attempt("t", "A", 1).unwrap();
        assert_eq!(record.max_num_score, 3);
        assert_eq!(engine.record_write(WriteRecord::new("t", "A", 3)).unwrap().num_score, 3);
        assert!(matches!(
            engine.tournament_add_attempt("t", "nobody", 1),
            Err(RankingError::NotFound(_))
        ));
    }

    #[test]
    fn test_create_tournament_requires_settings() {
        let (engine, _) = test_engine();
        assert!(matches!(
            engine.create_tournament(LeaderboardConfig::new("plain")),
            Err(RankingError::InvalidArgument(_))
        ));
        engine.create_leaderboard(LeaderboardConfig::new("plain")).unwrap();
        assert!(matches!(
            engine.tournament_status("plain", None),
            Err(RankingError::NotFound(_))
        ));
    }

    #[test]
    fn test_stats_count_writes() {
        let (engine, _) = test_engine();
        seed(&engine, "L1", &[("A", 1), ("B", 2)]);
        let stats = engine.stats();
        assert_eq!(stats.leaderboards, 1);
        assert_eq!(stats.tournaments, 0);
        assert_eq!(stats.record_writes, 2);
        assert_eq!(stats.rank_buckets, 1);
        assert_eq!(stats.cache_write_failures, 0);
    }
}
