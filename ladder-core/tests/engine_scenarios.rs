//! End-to-end engine scenarios
//!
//! Drives `RankingEngine` through its public API with a manual clock:
//! - Listing, haystack and owner records on a small leaderboard
//! - Operator semantics and the decrement floor policy
//! - Epoch isolation across cron resets
//! - Rank disable/enable
//! - Tournament windows, joins, caps and catalog filters
//! - Delete cascade

use parking_lot::Mutex;
use std::sync::Arc;

use ladder_core::engine::{HaystackQuery, ListRecords, TournamentFilter, WriteRecord};
use ladder_core::{
    DecrementFloor, EngineConfig, LeaderboardConfig, LeaderboardRecord, ManualClock, Operator,
    OverrideOperator, RankingEngine, RankingError, RolloverEvent, RolloverListener, SortOrder,
    TournamentSettings,
};

// 2024-01-01T00:00:00Z, a Monday.
const JAN_1_2024: i64 = 1_704_067_200;
const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;

// ============================================================
// Helpers
// ============================================================

fn engine_at(now: i64) -> (RankingEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    let engine = RankingEngine::in_memory(EngineConfig::default()).with_clock(clock.clone());
    (engine, clock)
}

fn write(engine: &RankingEngine, id: &str, owner: &str, score: i64) -> LeaderboardRecord {
    engine.record_write(WriteRecord::new(id, owner, score)).unwrap()
}

fn summary(records: &[LeaderboardRecord]) -> Vec<(&str, Option<i64>, i64)> {
    records
        .iter()
        .map(|r| (r.owner_id.as_str(), r.rank, r.score))
        .collect()
}

fn worked_example() -> RankingEngine {
    let (engine, _) = engine_at(JAN_1_2024);
    engine.create_leaderboard(LeaderboardConfig::new("L1")).unwrap();
    write(&engine, "L1", "A", 100);
    write(&engine, "L1", "B", 50);
    write(&engine, "L1", "C", 75);
    engine
}

fn haystack(id: &str, owner: &str, limit: usize) -> HaystackQuery {
    HaystackQuery {
        leaderboard_id: id.into(),
        owner_id: owner.into(),
        limit,
        ..Default::default()
    }
}

#[derive(Default)]
struct RolloverLog(Mutex<Vec<RolloverEvent>>);

impl RolloverListener for RolloverLog {
    fn on_rollover(&self, event: &RolloverEvent) {
        self.0.lock().push(event.clone());
    }
}

// ============================================================
// Listing
// ============================================================

#[test]
fn worked_example_list_and_haystack() {
    let engine = worked_example();

    let page = engine.records_list(ListRecords::new("L1", 2)).unwrap();
    assert_eq!(
        summary(&page.records),
        vec![("A", Some(1), 100), ("C", Some(2), 75)]
    );
    assert_eq!(page.rank_count, 3);
    assert!(page.next_cursor.is_some());
    assert!(page.prev_cursor.is_none());

    let page = engine.records_haystack(haystack("L1", "B", 2)).unwrap();
    assert_eq!(
        summary(&page.records),
        vec![("C", Some(2), 75), ("B", Some(3), 50)]
    );
    assert_eq!(summary(&page.owner_records), vec![("B", Some(3), 50)]);
}

#[test]
fn haystack_without_ranks_matches_ranked_window() {
    let engine = worked_example();
    engine.disable_ranks("L1").unwrap();
    let page = engine.records_haystack(haystack("L1", "B", 2)).unwrap();
    assert_eq!(summary(&page.records), vec![("C", None, 75), ("B", None, 50)]);
}

#[test]
fn haystack_for_owner_without_record() {
    let engine = worked_example();
    // A zero score sorts last on a descending board.
    let page = engine.records_haystack(haystack("L1", "newcomer", 2)).unwrap();
    assert_eq!(
        summary(&page.records),
        vec![("C", Some(2), 75), ("B", Some(3), 50)]
    );
    assert!(page.owner_records.is_empty());
}

#[test]
fn owner_records_ignore_page_window() {
    let engine = worked_example();
    let mut request = ListRecords::new("L1", 1);
    request.owner_ids = vec!["B".into(), "ghost".into()];
    let page = engine.records_list(request).unwrap();
    assert_eq!(summary(&page.records), vec![("A", Some(1), 100)]);
    assert_eq!(summary(&page.owner_records), vec![("B", Some(3), 50)]);
}

#[test]
fn pages_cover_every_record_once() {
    let (engine, _) = engine_at(JAN_1_2024);
    engine.create_leaderboard(LeaderboardConfig::new("big")).unwrap();
    for i in 0..25 {
        write(&engine, "big", &format!("p{i:02}"), (i * 7) % 11);
    }
    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = engine
            .records_list(ListRecords::new("big", 4).with_cursor(cursor))
            .unwrap();
        seen.extend(page.records.iter().map(|r| r.rank.unwrap()));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    assert_eq!(seen, (1..=25).collect::<Vec<i64>>());
}

// ============================================================
// Catalog
// ============================================================

#[test]
fn create_is_idempotent() {
    let (engine, _) = engine_at(JAN_1_2024);
    let mut first = LeaderboardConfig::new("L1");
    first.metadata = br#"{"season":1}"#.to_vec();
    let mut second = LeaderboardConfig::new("L1").with_operator(Operator::Set);
    second.metadata = br#"{"season":2}"#.to_vec();

    let (cfg, created) = engine.create_leaderboard(first).unwrap();
    assert!(created);
    let (again, created) = engine.create_leaderboard(second).unwrap();
    assert!(!created);
    assert_eq!(again.metadata, cfg.metadata);
    assert_eq!(again.operator, Operator::Best);
}

#[test]
fn create_rejects_bad_cron() {
    let (engine, _) = engine_at(JAN_1_2024);
    let err = engine
        .create_leaderboard(LeaderboardConfig::new("bad").with_reset_schedule("every tuesday"))
        .unwrap_err();
    assert!(matches!(err, RankingError::InvalidArgument(_)));
    assert!(engine.get_leaderboard("bad").is_err());
}

#[test]
fn delete_cascades_to_records() {
    let engine = worked_example();
    engine.delete_leaderboard("L1").unwrap();
    assert!(matches!(
        engine.records_list(ListRecords::new("L1", 10)),
        Err(RankingError::NotFound(_))
    ));
    assert!(matches!(
        engine.delete_leaderboard("L1"),
        Err(RankingError::NotFound(_))
    ));

    // Re-creating starts from an empty board.
    engine.create_leaderboard(LeaderboardConfig::new("L1")).unwrap();
    let page = engine.records_list(ListRecords::new("L1", 10)).unwrap();
    assert!(page.records.is_empty());
    assert_eq!(page.rank_count, 0);
    assert_eq!(engine.stats().rank_buckets, 1);
}

// ============================================================
// Operators
// ============================================================

#[test]
fn best_descending_keeps_better_score() {
    let (engine, _) = engine_at(JAN_1_2024);
    engine.create_leaderboard(LeaderboardConfig::new("L1")).unwrap();
    write(&engine, "L1", "A", 10);
    assert_eq!(write(&engine, "L1", "A", 5).score, 10);
    assert_eq!(write(&engine, "L1", "A", 15).score, 15);
}

#[test]
fn increment_accumulates() {
    let (engine, _) = engine_at(JAN_1_2024);
    engine
        .create_leaderboard(LeaderboardConfig::new("xp").with_operator(Operator::Increment))
        .unwrap();
    write(&engine, "xp", "A", 5);
    let record = write(&engine, "xp", "A", 5);
    assert_eq!(record.score, 10);
    assert_eq!(record.num_score, 2);
}

#[test]
fn decrement_floor_is_a_config_policy() {
    let (engine, _) = engine_at(JAN_1_2024);
    engine
        .create_leaderboard(LeaderboardConfig::new("floored").with_operator(Operator::Decrement))
        .unwrap();
    let mut unbounded = LeaderboardConfig::new("unbounded").with_operator(Operator::Decrement);
    unbounded.decrement_floor = DecrementFloor::Unbounded;
    engine.create_leaderboard(unbounded).unwrap();

    assert_eq!(write(&engine, "floored", "A", 7).score, 0);
    assert_eq!(write(&engine, "unbounded", "A", 7).score, -7);
}

#[test]
fn override_operator_applies_to_one_write() {
    let (engine, _) = engine_at(JAN_1_2024);
    engine.create_leaderboard(LeaderboardConfig::new("L1")).unwrap();
    write(&engine, "L1", "A", 10);
    let record = engine
        .record_write(
            WriteRecord::new("L1", "A", 3).with_operator(OverrideOperator::Use(Operator::Increment)),
        )
        .unwrap();
    assert_eq!(record.score, 13);
    // The next write falls back to `best`.
    assert_eq!(write(&engine, "L1", "A", 1).score, 13);
}

// ============================================================
// Epochs
// ============================================================

#[test]
fn writes_after_reset_leave_previous_epoch_untouched() {
    let (engine, clock) = engine_at(JAN_1_2024 + HOUR);
    let log = Arc::new(RolloverLog::default());
    engine.add_rollover_listener(log.clone());
    engine
        .create_leaderboard(LeaderboardConfig::new("daily").with_reset_schedule("0 0 * * *"))
        .unwrap();
    write(&engine, "daily", "A", 100);
    write(&engine, "daily", "B", 50);
    let first_expiry = engine.epoch_state("daily").unwrap().current.expiry;
    assert_eq!(first_expiry, JAN_1_2024 + DAY);

    clock.set(JAN_1_2024 + DAY + HOUR);
    let fresh = write(&engine, "daily", "A", 1);
    assert_eq!(fresh.score, 1);
    assert_eq!(fresh.num_score, 1);
    assert_eq!(fresh.rank, Some(1));
    assert_eq!(fresh.expiry_time, Some(JAN_1_2024 + 2 * DAY));

    let current = engine.records_list(ListRecords::new("daily", 10)).unwrap();
    assert_eq!(summary(&current.records), vec![("A", Some(1), 1)]);

    let previous = engine
        .records_list(ListRecords::new("daily", 10).with_expiry(first_expiry))
        .unwrap();
    assert_eq!(
        summary(&previous.records),
        vec![("A", Some(1), 100), ("B", Some(2), 50)]
    );

    assert!(matches!(
        engine.records_list(ListRecords::new("daily", 10).with_expiry(first_expiry + 1)),
        Err(RankingError::InvalidArgument(_))
    ));

    let events = log.0.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].previous.expiry, first_expiry);
}

#[test]
fn cursor_from_previous_epoch_is_rejected_in_current() {
    let (engine, clock) = engine_at(JAN_1_2024 + HOUR);
    engine
        .create_leaderboard(LeaderboardConfig::new("daily").with_reset_schedule("0 0 * * *"))
        .unwrap();
    write(&engine, "daily", "A", 3);
    write(&engine, "daily", "B", 2);
    let cursor = engine
        .records_list(ListRecords::new("daily", 1))
        .unwrap()
        .next_cursor;

    clock.advance(DAY);
    assert!(matches!(
        engine.records_list(ListRecords::new("daily", 1).with_cursor(cursor)),
        Err(RankingError::InvalidArgument(_))
    ));
}

#[test]
fn scheduler_tick_rolls_idle_leaderboards() {
    let (engine, clock) = engine_at(JAN_1_2024 + HOUR);
    engine
        .create_leaderboard(LeaderboardConfig::new("daily").with_reset_schedule("0 0 * * *"))
        .unwrap();
    engine.create_leaderboard(LeaderboardConfig::new("forever")).unwrap();
    assert_eq!(engine.run_scheduler_tick(), 0);
    clock.advance(DAY);
    assert_eq!(engine.run_scheduler_tick(), 1);
    assert_eq!(engine.run_scheduler_tick(), 0);
}

// ============================================================
// Rank toggles
// ============================================================

#[test]
fn disable_then_enable_restores_ranks() {
    let engine = worked_example();
    engine.disable_ranks("L1").unwrap();
    engine.disable_ranks("L1").unwrap();

    let page = engine.records_list(ListRecords::new("L1", 10)).unwrap();
    assert_eq!(
        summary(&page.records),
        vec![("A", None, 100), ("C", None, 75), ("B", None, 50)]
    );
    assert_eq!(page.rank_count, 3);
    assert!(matches!(
        engine.cursor_from_rank("L1", 2, 0),
        Err(RankingError::RanksDisabled(_))
    ));

    write(&engine, "L1", "D", 80);
    engine.enable_ranks("L1").unwrap();
    let record = write(&engine, "L1", "E", 10);
    assert_eq!(record.rank, Some(5));
    let page = engine.records_list(ListRecords::new("L1", 10)).unwrap();
    assert_eq!(page.records[1].owner_id, "D");
    assert_eq!(page.records[1].rank, Some(2));
}

// ============================================================
// Tournaments
// ============================================================

fn hourly_cup(engine: &RankingEngine, id: &str, settings: TournamentSettings) {
    engine
        .create_tournament(LeaderboardConfig::new_tournament(id, settings))
        .unwrap();
}

#[test]
fn join_required_tournament() {
    let (engine, _) = engine_at(JAN_1_2024 + 10);
    hourly_cup(
        &engine,
        "cup",
        TournamentSettings {
            title: "Cup".into(),
            start_time: JAN_1_2024,
            duration: HOUR,
            join_required: true,
            ..Default::default()
        },
    );

    assert!(matches!(
        engine.record_write(WriteRecord::new("cup", "A", 10)),
        Err(RankingError::JoinRequired(_))
    ));
    let joined = engine.tournament_join("cup", "A", Some("alice".into())).unwrap();
    assert_eq!(joined.num_score, 0);
    assert_eq!(joined.username.as_deref(), Some("alice"));
    assert_eq!(joined.rank, Some(1));

    let again = engine.tournament_join("cup", "A", None).unwrap();
    assert_eq!(again.username.as_deref(), Some("alice"));

    let record = write(&engine, "cup", "A", 10);
    assert_eq!(record.num_score, 1);

    let status = engine.tournament_status("cup", Some("A")).unwrap();
    assert!(status.active);
    assert!(status.can_enter);
    assert_eq!(status.joined, Some(true));
    assert_eq!(status.size, 1);
    let stranger = engine.tournament_status("cup", Some("B")).unwrap();
    assert!(!stranger.can_enter);
}

#[test]
fn first_score_after_join_is_not_merged_with_join_record() {
    let (engine, _) = engine_at(JAN_1_2024 + 10);
    let settings = TournamentSettings {
        start_time: JAN_1_2024,
        duration: HOUR,
        join_required: true,
        ..Default::default()
    };
    engine
        .create_tournament(
            LeaderboardConfig::new_tournament("race", settings.clone())
                .with_sort_order(SortOrder::Ascending),
        )
        .unwrap();
    engine
        .create_tournament(LeaderboardConfig::new_tournament("dive", settings))
        .unwrap();

    engine.tournament_join("race", "A", None).unwrap();
    let mut first = WriteRecord::new("race", "A", 50);
    first.metadata = Some(b"lap-1".to_vec());
    let record = engine.record_write(first).unwrap();
    assert_eq!((record.score, record.num_score), (50, 1));
    assert_eq!(record.metadata, b"lap-1");

    // Later writes merge as usual: a slower time is ignored, a faster one kept.
    assert_eq!(write(&engine, "race", "A", 60).score, 50);
    assert_eq!(write(&engine, "race", "A", 40).score, 40);

    engine.tournament_join("dive", "B", None).unwrap();
    assert_eq!(write(&engine, "dive", "B", -5).score, -5);
}

#[test]
fn lowering_attempt_cap_blocks_further_writes() {
    let (engine, _) = engine_at(JAN_1_2024 + 10);
    hourly_cup(
        &engine,
        "cup",
        TournamentSettings {
            start_time: JAN_1_2024,
            duration: HOUR,
            max_num_score: 2,
            ..Default::default()
        },
    );
    write(&engine, "cup", "A", 10);

    let record = engine.tournament_add_attempt("cup", "A", -2).unwrap();
    assert_eq!(record.max_num_score, 0);
    for score in [11, 12] {
        assert!(matches!(
            engine.record_write(WriteRecord::new("cup", "A", score)),
            Err(RankingError::AttemptsExceeded)
        ));
    }

    // Back to 1 is still used up; 2 allows one more write.
    assert_eq!(engine.tournament_add_attempt("cup", "A", 1).unwrap().max_num_score, 1);
    assert!(engine.record_write(WriteRecord::new("cup", "A", 11)).is_err());
    assert_eq!(engine.tournament_add_attempt("cup", "A", 1).unwrap().max_num_score, 2);
    assert_eq!(write(&engine, "cup", "A", 11).num_score, 2);
}

#[test]
fn adding_attempts_to_unlimited_tournament_keeps_it_unlimited() {
    let (engine, _) = engine_at(JAN_1_2024 + 10);
    hourly_cup(
        &engine,
        "open",
        TournamentSettings {
            start_time: JAN_1_2024,
            duration: HOUR,
            ..Default::default()
        },
    );
    for score in 1..=3 {
        write(&engine, "open", "A", score);
    }

    let record = engine.tournament_add_attempt("open", "A", 1).unwrap();
    assert_eq!(record.max_num_score, 0);
    assert_eq!(write(&engine, "open", "A", 4).num_score, 4);

    engine.tournament_add_attempt("open", "A", -5).unwrap();
    assert_eq!(write(&engine, "open", "A", 5).num_score, 5);
}

#[test]
fn full_tournament_rejects_new_entrants() {
    let (engine, _) = engine_at(JAN_1_2024 + 10);
    hourly_cup(
        &engine,
        "duel",
        TournamentSettings {
            start_time: JAN_1_2024,
            duration: HOUR,
            max_size: 2,
            ..Default::default()
        },
    );
    write(&engine, "duel", "A", 1);
    engine.tournament_join("duel", "B", None).unwrap();
    assert!(matches!(
        engine.record_write(WriteRecord::new("duel", "C", 1)),
        Err(RankingError::TournamentFull(_))
    ));
    assert!(matches!(
        engine.tournament_join("duel", "C", None),
        Err(RankingError::TournamentFull(_))
    ));
    // Existing entrants keep playing.
    assert_eq!(write(&engine, "duel", "B", 9).score, 9);
}

#[test]
fn writes_outside_active_window_fail() {
    let (engine, clock) = engine_at(JAN_1_2024 - 10);
    hourly_cup(
        &engine,
        "daily-cup",
        TournamentSettings {
            start_time: JAN_1_2024,
            end_time: JAN_1_2024 + 3 * DAY,
            duration: HOUR,
            ..Default::default()
        },
    );
    let err = engine.record_write(WriteRecord::new("daily-cup", "A", 1)).unwrap_err();
    assert!(matches!(err, RankingError::TournamentNotActive(_)));

    clock.set(JAN_1_2024 + 30 * 60);
    write(&engine, "daily-cup", "A", 1);

    clock.set(JAN_1_2024 + 2 * HOUR);
    assert!(matches!(
        engine.tournament_join("daily-cup", "B", None),
        Err(RankingError::TournamentNotActive(_))
    ));
    let status = engine.tournament_status("daily-cup", None).unwrap();
    assert!(!status.active);
    assert_eq!(status.start_active, JAN_1_2024);
    assert_eq!(status.end_active, JAN_1_2024 + HOUR);
    assert_eq!(status.expiry_time, Some(JAN_1_2024 + 3 * DAY));
}

#[test]
fn recurring_tournament_resets_each_day() {
    let (engine, clock) = engine_at(JAN_1_2024 + 10);
    let settings = TournamentSettings {
        start_time: JAN_1_2024,
        duration: 2 * HOUR,
        ..Default::default()
    };
    engine
        .create_tournament(
            LeaderboardConfig::new_tournament("nightly", settings).with_reset_schedule("0 0 * * *"),
        )
        .unwrap();
    write(&engine, "nightly", "A", 5);

    clock.set(JAN_1_2024 + DAY + 10);
    let status = engine.tournament_status("nightly", None).unwrap();
    assert!(status.active);
    assert_eq!(status.size, 0);
    assert_eq!(status.prev_reset, JAN_1_2024 + DAY);
    assert_eq!(status.next_reset, Some(JAN_1_2024 + 2 * DAY));
}

#[test]
fn tournament_list_filters_by_category_and_time() {
    let (engine, _) = engine_at(JAN_1_2024);
    for (id, category, start) in [("t-a", 1u8, JAN_1_2024), ("t-b", 5, JAN_1_2024 + DAY), ("t-c", 9, JAN_1_2024)] {
        hourly_cup(
            &engine,
            id,
            TournamentSettings {
                category,
                start_time: start,
                duration: HOUR,
                ..Default::default()
            },
        );
    }
    engine.create_leaderboard(LeaderboardConfig::new("plain")).unwrap();

    let page = engine
        .tournament_list(&TournamentFilter {
            category_start: 1,
            category_end: 5,
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<&str> = page.tournaments.iter().map(|t| t.config.id.as_str()).collect();
    assert_eq!(ids, vec!["t-a", "t-b"]);

    let page = engine
        .tournament_list(&TournamentFilter {
            start_time: JAN_1_2024 + HOUR,
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<&str> = page.tournaments.iter().map(|t| t.config.id.as_str()).collect();
    assert_eq!(ids, vec!["t-b"]);

    let first = engine
        .tournament_list(&TournamentFilter {
            limit: 2,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(first.tournaments.len(), 2);
    let rest = engine
        .tournament_list(&TournamentFilter {
            limit: 2,
            cursor: first.next_cursor,
            ..Default::default()
        })
        .unwrap();
    let ids: Vec<&str> = rest.tournaments.iter().map(|t| t.config.id.as_str()).collect();
    assert_eq!(ids, vec!["t-c"]);
    assert!(rest.next_cursor.is_none());
}
