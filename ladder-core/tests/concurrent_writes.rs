//! Concurrent write stress tests.
//!
//! Many threads hammer one engine with increment writes on shared owners,
//! while a reader pages through the board. Totals, attempt counts and the
//! rank sequence must come out exact.

use std::collections::HashSet;

use ladder_core::engine::{ListRecords, WriteRecord};
use ladder_core::{EngineConfig, LeaderboardConfig, Operator, RankingEngine};

const THREADS: i64 = 8;
const OWNERS: i64 = 16;
const ROUNDS: i64 = 25;

// ============================================================
// Helpers
// ============================================================

fn owner(i: i64) -> String {
    format!("owner-{i:02}")
}

fn increment_board(engine: &RankingEngine, id: &str) {
    engine
        .create_leaderboard(LeaderboardConfig::new(id).with_operator(Operator::Increment))
        .unwrap();
}

// ============================================================
// Tests
// ============================================================

#[test]
fn concurrent_increments_sum_exactly() {
    let engine = RankingEngine::in_memory(EngineConfig::default());
    increment_board(&engine, "xp");

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let engine = &engine;
            s.spawn(move || {
                for _ in 0..ROUNDS {
                    for o in 0..OWNERS {
                        let delta = (t + 1) * (o + 1);
                        engine
                            .record_write(WriteRecord::new("xp", owner(o), delta))
                            .unwrap();
                    }
                }
            });
        }

        // Pages read mid-write stay internally consistent.
        let engine = &engine;
        s.spawn(move || {
            for _ in 0..50 {
                let page = engine.records_list(ListRecords::new("xp", 100)).unwrap();
                let ranks: Vec<i64> = page.records.iter().filter_map(|r| r.rank).collect();
                for pair in ranks.windows(2) {
                    assert!(pair[0] < pair[1], "ranks out of order: {ranks:?}");
                }
            }
        });
    });

    let thread_sum = THREADS * (THREADS + 1) / 2;
    let page = engine.records_list(ListRecords::new("xp", 100)).unwrap();
    assert_eq!(page.rank_count, OWNERS);
    assert_eq!(page.records.len(), OWNERS as usize);

    for record in &page.records {
        let o: i64 = record.owner_id["owner-".len()..].parse().unwrap();
        assert_eq!(record.score, ROUNDS * (o + 1) * thread_sum, "owner {o}");
        assert_eq!(i64::from(record.num_score), ROUNDS * THREADS, "owner {o}");
    }

    let ranks: Vec<i64> = page.records.iter().map(|r| r.rank.unwrap()).collect();
    assert_eq!(ranks, (1..=OWNERS).collect::<Vec<_>>());
    let unique: HashSet<i64> = ranks.iter().copied().collect();
    assert_eq!(unique.len(), OWNERS as usize);

    // Larger owner index means a larger total, so rank 1 is the last owner.
    let owners: Vec<&str> = page.records.iter().map(|r| r.owner_id.as_str()).collect();
    let expected: Vec<String> = (0..OWNERS).rev().map(owner).collect();
    assert_eq!(owners, expected);
}

#[test]
fn concurrent_first_writes_on_fresh_board() {
    let engine = RankingEngine::in_memory(EngineConfig::default());
    increment_board(&engine, "fresh");

    // Every thread races to be first on every owner.
    std::thread::scope(|s| {
        for _ in 0..THREADS {
            let engine = &engine;
            s.spawn(move || {
                for o in 0..OWNERS {
                    engine
                        .record_write(WriteRecord::new("fresh", owner(o), 1))
                        .unwrap();
                }
            });
        }
    });

    let page = engine.records_list(ListRecords::new("fresh", 100)).unwrap();
    assert_eq!(page.rank_count, OWNERS);
    for record in &page.records {
        assert_eq!(record.score, THREADS);
        assert_eq!(i64::from(record.num_score), THREADS);
    }
    let ranks: HashSet<i64> = page.records.iter().filter_map(|r| r.rank).collect();
    assert_eq!(ranks, (1..=OWNERS).collect::<HashSet<_>>());
}
