//! Record listings: paged, owner-centred and cursor-from-rank.
//!
//! With ranks enabled, pages are sliced out of the rank cache and hydrated
//! from the record store in cache order. With ranks disabled, the store is
//! scanned in sort order instead and records come back without ranks. Both
//! paths speak the same cursor: an anchor `(score, subscore, owner)` plus a
//! direction, so a cursor stays valid across a disable/enable flip.

use std::collections::HashMap;

use crate::cursor::{non_empty, RecordCursor};
use crate::engine::helpers::{check_limit, check_owner, encode_cursor};
use crate::engine::messages::{HaystackQuery, ListRecords, RecordPage};
use crate::engine::ranking::RankingEngine;
use crate::error::{RankingError, Result};
use crate::rank_cache::RankWindow;
use crate::record_store::ScanRequest;
use crate::types::{Direction, LeaderboardConfig, LeaderboardRecord, RankKey};

impl RankingEngine {
    /// One page of an epoch's records in rank order, plus the requested
    /// owners' records regardless of the page window.
    pub fn records_list(&self, request: ListRecords) -> Result<RecordPage> {
        check_limit(request.limit, self.settings.max_list_limit)?;
        let cfg = self.configs.get(&request.leaderboard_id)?;
        let expiry = self.resolve_expiry(&cfg, request.override_expiry)?;
        let cursor = decode_cursor(&cfg, expiry, request.cursor.as_deref())?;

        let mut owner_records = self
            .records
            .get_many(&cfg.id, expiry, &request.owner_ids)?;
        self.attach_ranks(&cfg, expiry, &mut owner_records);

        let anchor = cursor.as_ref().map(|c| {
            let direction = if c.is_next {
                Direction::Forward
            } else {
                Direction::Backward
            };
            (c.anchor(), direction)
        });

        let mut page = if self.ranked(&cfg, expiry) {
            let window = self.cache.page(
                &cfg.id,
                expiry,
                anchor.as_ref().map(|(key, dir)| (key, *dir)),
                request.limit,
            )?;
            self.hydrate(&cfg, expiry, window)?
        } else {
            self.scan_page(&cfg, expiry, anchor, request.limit)?
        };
        page.owner_records = owner_records;
        Ok(page)
    }

    /// A window of up to `limit` records around `owner_id`: up to half of
    /// it ranked ahead of the owner, the rest from the owner onward. Owners
    /// without a record are centred where a zero score would sort. With a
    /// cursor this behaves like a plain listing.
    pub fn records_haystack(&self, query: HaystackQuery) -> Result<RecordPage> {
        check_owner(&query.owner_id)?;
        check_limit(query.limit, self.settings.max_haystack_limit)?;
        if non_empty(query.cursor.as_deref()).is_some() {
            return self.records_list(ListRecords {
                leaderboard_id: query.leaderboard_id,
                owner_ids: vec![query.owner_id],
                limit: query.limit,
                cursor: query.cursor,
                override_expiry: query.override_expiry,
            });
        }

        let cfg = self.configs.get(&query.leaderboard_id)?;
        let expiry = self.resolve_expiry(&cfg, query.override_expiry)?;
        let own = self.records.get(&cfg.id, expiry, &query.owner_id)?;
        let key = own
            .as_ref()
            .map(LeaderboardRecord::rank_key)
            .unwrap_or_else(|| RankKey::new(0, 0, query.owner_id.clone()));

        let mut page = if self.ranked(&cfg, expiry) {
            let window = self.cache.around(&cfg.id, expiry, &key, query.limit)?;
            self.hydrate(&cfg, expiry, window)?
        } else {
            self.scan_around(&cfg, expiry, &key, own.is_some(), query.limit)?
        };

        let mut owner_records: Vec<LeaderboardRecord> = own.into_iter().collect();
        self.attach_ranks(&cfg, expiry, &mut owner_records);
        page.owner_records = owner_records;
        Ok(page)
    }

    /// Cursor that makes a listing start at `rank`. Rank 1 is the start of
    /// the list and yields an empty cursor.
    pub fn cursor_from_rank(&self, leaderboard_id: &str, rank: i64, override_expiry: i64) -> Result<String> {
        let cfg = self.configs.get(leaderboard_id)?;
        if !self.ranks_enabled(&cfg) {
            return Err(RankingError::RanksDisabled(cfg.id.clone()));
        }
        if rank < 1 {
            return Err(RankingError::invalid("rank must be 1 or greater"));
        }
        let expiry = self.resolve_expiry(&cfg, override_expiry)?;
        if rank == 1 {
            return Ok(String::new());
        }
        self.prepare_bucket(&cfg, expiry)?;
        let key = self.cache.get_data_by_rank(&cfg.id, expiry, rank - 1)?;
        Ok(encode_cursor(&cfg.id, expiry, &key, Some(rank - 1), true))
    }

    /// Epoch expiry a read targets: the current epoch, or a past one named
    /// by `override_expiry`.
    pub(super) fn resolve_expiry(&self, cfg: &LeaderboardConfig, override_expiry: i64) -> Result<i64> {
        let now = self.now();
        if override_expiry == 0 {
            return Ok(self.epoch(cfg, now).current.expiry);
        }
        if self.scheduler.is_known_expiry(cfg, override_expiry, now) {
            Ok(override_expiry)
        } else {
            Err(RankingError::invalid(format!(
                "expiry {override_expiry} is not a reset boundary of {}",
                cfg.id
            )))
        }
    }

    /// Fetch full records for a cache window, keeping cache order. Rows
    /// deleted since the window was cut are skipped.
    fn hydrate(&self, cfg: &LeaderboardConfig, expiry: i64, window: RankWindow) -> Result<RecordPage> {
        let owners: Vec<String> = window
            .entries
            .iter()
            .map(|e| e.key.owner_id.clone())
            .collect();
        let mut fetched: HashMap<String, LeaderboardRecord> = self
            .records
            .get_many(&cfg.id, expiry, &owners)?
            .into_iter()
            .map(|r| (r.owner_id.clone(), r))
            .collect();

        let mut records = Vec::with_capacity(window.entries.len());
        for entry in &window.entries {
            if let Some(mut record) = fetched.remove(&entry.key.owner_id) {
                record.rank = Some(entry.rank);
                records.push(record);
            }
        }

        let next_cursor = window
            .entries
            .last()
            .filter(|_| window.has_after)
            .map(|e| encode_cursor(&cfg.id, expiry, &e.key, Some(e.rank), true));
        let prev_cursor = window
            .entries
            .first()
            .filter(|_| window.has_before)
            .map(|e| encode_cursor(&cfg.id, expiry, &e.key, Some(e.rank), false));

        Ok(RecordPage {
            records,
            owner_records: Vec::new(),
            next_cursor,
            prev_cursor,
            rank_count: window.total,
        })
    }

    /// Unranked page straight from a sorted store scan.
    fn scan_page(
        &self,
        cfg: &LeaderboardConfig,
        expiry: i64,
        anchor: Option<(RankKey, Direction)>,
        limit: usize,
    ) -> Result<RecordPage> {
        let direction = anchor.as_ref().map_or(Direction::Forward, |(_, d)| *d);
        let mut rows = self.records.scan_sorted(&ScanRequest {
            leaderboard_id: &cfg.id,
            expiry,
            order: cfg.sort_order,
            anchor: anchor.as_ref().map(|(key, _)| key),
            direction,
            limit: limit + 1,
        })?;

        let more = rows.len() > limit;
        let (has_before, has_after) = match direction {
            Direction::Forward => {
                rows.truncate(limit);
                (anchor.is_some(), more)
            }
            Direction::Backward => {
                if more {
                    rows.remove(0);
                }
                (more, true)
            }
        };
        self.unranked_page(cfg, expiry, rows, has_before, has_after)
    }

    /// Unranked owner-centred window, assembled from one scan on each side
    /// of the owner's key.
    fn scan_around(
        &self,
        cfg: &LeaderboardConfig,
        expiry: i64,
        key: &RankKey,
        owner_present: bool,
        limit: usize,
    ) -> Result<RecordPage> {
        let scan = |direction| {
            self.records.scan_sorted(&ScanRequest {
                leaderboard_id: &cfg.id,
                expiry,
                order: cfg.sort_order,
                anchor: Some(key),
                direction,
                limit: limit + 1,
            })
        };
        let mut before = scan(Direction::Backward)?;
        let mut after = scan(Direction::Forward)?;
        let own = if owner_present {
            self.records.get(&cfg.id, expiry, &key.owner_id)?
        } else {
            None
        };

        let slots = limit - usize::from(own.is_some());
        let mut take_before = before.len().min(limit / 2).min(slots);
        let take_after = after.len().min(slots - take_before);
        take_before = before.len().min(slots - take_after);

        let has_before = before.len() > take_before;
        let has_after = after.len() > take_after;
        let mut rows = before.split_off(before.len() - take_before);
        rows.extend(own);
        after.truncate(take_after);
        rows.append(&mut after);

        self.unranked_page(cfg, expiry, rows, has_before, has_after)
    }

    fn unranked_page(
        &self,
        cfg: &LeaderboardConfig,
        expiry: i64,
        rows: Vec<LeaderboardRecord>,
        has_before: bool,
        has_after: bool,
    ) -> Result<RecordPage> {
        let next_cursor = rows
            .last()
            .filter(|_| has_after)
            .map(|r| encode_cursor(&cfg.id, expiry, &r.rank_key(), None, true));
        let prev_cursor = rows
            .first()
            .filter(|_| has_before)
            .map(|r| encode_cursor(&cfg.id, expiry, &r.rank_key(), None, false));
        let rank_count = self.records.count(&cfg.id, expiry)? as i64;
        Ok(RecordPage {
            records: rows,
            owner_records: Vec::new(),
            next_cursor,
            prev_cursor,
            rank_count,
        })
    }
}

/// Decode a record cursor and check it belongs to this leaderboard/epoch.
fn decode_cursor(cfg: &LeaderboardConfig, expiry: i64, token: Option<&str>) -> Result<Option<RecordCursor>> {
    let Some(token) = non_empty(token) else {
        return Ok(None);
    };
    let cursor = RecordCursor::decode(token)?;
    if cursor.leaderboard_id != cfg.id {
        return Err(RankingError::not_found(format!(
            "leaderboard {} named by cursor",
            cursor.leaderboard_id
        )));
    }
    if cursor.expiry != expiry {
        return Err(RankingError::invalid("cursor expiry does not match"));
    }
    Ok(Some(cursor))
}
