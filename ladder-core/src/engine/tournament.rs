//! Tournament operations layered on the ranking engine.
//!
//! A tournament is a leaderboard config carrying `TournamentSettings`. On top
//! of the plain write path it adds an active window per epoch, an optional
//! join step, a size cap and per-owner attempt caps.

use std::sync::Arc;
use tracing::{debug, info};

use crate::config_store::MAX_CATALOG_LIMIT;
use crate::engine::helpers::{check_limit, check_owner};
use crate::engine::messages::{TournamentFilter, TournamentStatus};
use crate::engine::ranking::RankingEngine;
use crate::error::{RankingError, Result};
use crate::scheduler::ActiveWindow;
use crate::types::{LeaderboardConfig, LeaderboardRecord, TournamentSettings};

/// Tournament config with its status at listing time.
#[derive(Debug, Clone)]
pub struct TournamentEntry {
    pub config: Arc<LeaderboardConfig>,
    pub status: TournamentStatus,
}

#[derive(Debug, Clone)]
pub struct TournamentPage {
    pub tournaments: Vec<TournamentEntry>,
    pub next_cursor: Option<String>,
}

impl RankingEngine {
    /// Create a tournament; same idempotency as `create_leaderboard`.
    pub fn create_tournament(
        &self,
        config: LeaderboardConfig,
    ) -> Result<(Arc<LeaderboardConfig>, bool)> {
        if !config.is_tournament() {
            return Err(RankingError::invalid("tournament settings are required"));
        }
        self.create_leaderboard(config)
    }

    /// Enter the current epoch with a zero record. Joining again is a no-op
    /// that returns the existing record.
    pub fn tournament_join(
        &self,
        tournament_id: &str,
        owner_id: &str,
        username: Option<String>,
    ) -> Result<LeaderboardRecord> {
        check_owner(owner_id)?;
        let (cfg, settings) = self.tournament(tournament_id)?;
        let now = self.now();
        let epoch = self.epoch(&cfg, now).current;
        if !ActiveWindow::for_epoch(&settings, &epoch).contains(now) {
            return Err(RankingError::TournamentNotActive(cfg.id.clone()));
        }

        let guard = self.owner_locks.lock(&cfg.id, owner_id);
        if let Some(mut existing) = self.records.get(&cfg.id, epoch.expiry, owner_id)? {
            drop(guard);
            existing.rank = self.rank_of(&cfg, epoch.expiry, owner_id);
            return Ok(existing);
        }
        self.check_capacity(&cfg, &settings, epoch.expiry)?;

        let mut record =
            LeaderboardRecord::fresh(&cfg.id, owner_id, &epoch, settings.max_num_score, now);
        record.username = username.filter(|u| !u.is_empty());
        self.records.upsert(&record)?;
        self.index(&cfg, epoch.expiry, &record);
        drop(guard);

        info!(tournament = %cfg.id, owner = owner_id, "tournament joined");
        record.rank = self.rank_of(&cfg, epoch.expiry, owner_id);
        Ok(record)
    }

    /// Raise or lower one owner's attempt cap for the current epoch. The cap
    /// floors at 0 (no attempts left); unlimited tournaments are unaffected.
    pub fn tournament_add_attempt(
        &self,
        tournament_id: &str,
        owner_id: &str,
        delta: i32,
    ) -> Result<LeaderboardRecord> {
        check_owner(owner_id)?;
        let (cfg, settings) = self.tournament(tournament_id)?;
        let now = self.now();
        let expiry = self.epoch(&cfg, now).current.expiry;

        let guard = self.owner_locks.lock(&cfg.id, owner_id);
        let mut record = self
            .records
            .get(&cfg.id, expiry, owner_id)?
            .ok_or_else(|| RankingError::not_found(format!("record for owner {owner_id}")))?;
        if settings.max_num_score == 0 {
            // Unlimited tournaments have no personal cap to adjust.
            drop(guard);
            record.rank = self.rank_of(&cfg, expiry, owner_id);
            return Ok(record);
        }
        record.max_num_score = record.max_num_score.saturating_add(delta).max(0);
        record.update_time = now;
        self.records.upsert(&record)?;
        drop(guard);

        debug!(
            tournament = %cfg.id,
            owner = owner_id,
            delta,
            max_num_score = record.max_num_score,
            "attempt cap adjusted"
        );
        record.rank = self.rank_of(&cfg, expiry, owner_id);
        Ok(record)
    }

    /// Window, size and entry status of a tournament, optionally from one
    /// owner's point of view.
    pub fn tournament_status(
        &self,
        tournament_id: &str,
        owner_id: Option<&str>,
    ) -> Result<TournamentStatus> {
        let (cfg, settings) = self.tournament(tournament_id)?;
        self.status_of(&cfg, &settings, owner_id)
    }

    /// Catalog listing restricted to tournaments matching `filter`.
    pub fn tournament_list(&self, filter: &TournamentFilter) -> Result<TournamentPage> {
        check_limit(filter.limit, MAX_CATALOG_LIMIT)?;
        if filter.category_start > filter.category_end {
            return Err(RankingError::invalid("category start must not exceed category end"));
        }
        if filter.end_time > 0 && filter.end_time < filter.start_time {
            return Err(RankingError::invalid("end time must not be before start time"));
        }

        let page = self
            .configs
            .list(filter.limit, filter.cursor.as_deref(), |cfg| matches(cfg, filter))?;
        let mut tournaments = Vec::with_capacity(page.configs.len());
        for config in page.configs {
            let Some(settings) = config.tournament.clone() else {
                continue;
            };
            let status = self.status_of(&config, &settings, None)?;
            tournaments.push(TournamentEntry { config, status });
        }
        Ok(TournamentPage {
            tournaments,
            next_cursor: page.next_cursor,
        })
    }

    fn tournament(&self, id: &str) -> Result<(Arc<LeaderboardConfig>, TournamentSettings)> {
        let cfg = self
            .configs
            .get(id)
            .map_err(|_| RankingError::not_found(format!("tournament {id}")))?;
        let settings = cfg
            .tournament
            .clone()
            .ok_or_else(|| RankingError::not_found(format!("tournament {id}")))?;
        Ok((cfg, settings))
    }

    fn status_of(
        &self,
        cfg: &LeaderboardConfig,
        settings: &TournamentSettings,
        owner_id: Option<&str>,
    ) -> Result<TournamentStatus> {
        let now = self.now();
        let state = self.epoch(cfg, now);
        let window = ActiveWindow::for_epoch(settings, &state.current);
        let active = window.contains(now);
        let size = self.records.count(&cfg.id, state.current.expiry)?;
        let joined = match owner_id {
            Some(owner) => Some(
                self.records
                    .get(&cfg.id, state.current.expiry, owner)?
                    .is_some(),
            ),
            None => None,
        };
        let full = settings.max_size > 0 && size >= u64::from(settings.max_size);
        let can_enter = active && (joined == Some(true) || (!settings.join_required && !full));

        Ok(TournamentStatus {
            id: cfg.id.clone(),
            active,
            can_enter,
            start_active: window.start,
            end_active: window.end,
            expiry_time: state.current.expiry_time(),
            prev_reset: state.prev_reset,
            next_reset: state.next_reset,
            size,
            max_size: settings.max_size,
            joined,
        })
    }
}

fn matches(cfg: &LeaderboardConfig, filter: &TournamentFilter) -> bool {
    let Some(t) = &cfg.tournament else {
        return false;
    };
    if t.category < filter.category_start || t.category > filter.category_end {
        return false;
    }
    if filter.start_time > 0 && t.start_time < filter.start_time {
        return false;
    }
    if filter.end_time > 0 && (t.end_time == 0 || t.end_time > filter.end_time) {
        return false;
    }
    true
}
