//! Reset Scheduler - epoch boundaries per leaderboard
//!
//! ## State machine (per config)
//! ```text
//! no schedule, no end time ──► permanent epoch (expiry 0), never rolls
//!
//! cron schedule ──► E0 ──(now ≥ next_reset)──► E1 ──► E2 ──► ...
//!                   │                          │
//!                   └── history: [E0.expiry]   └── history: [E0.expiry, E1.expiry]
//! ```
//!
//! Each config's state is an immutable `EpochState` snapshot behind an `Arc`.
//! Readers clone the `Arc`; a rollover builds the successor snapshot and swaps
//! it into the map in one step. Superseded epochs are never touched again.
//! Rollover happens lazily on the first access past `next_reset`, or on the
//! periodic `tick`, whichever comes first.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cron::CronClock;
use crate::error::Result;
use crate::types::{Epoch, LeaderboardConfig, TournamentSettings};

/// Snapshot of a config's epoch bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochState {
    pub leaderboard_id: String,
    pub current: Epoch,
    /// Boundary the current epoch started at (0 for a permanent epoch).
    pub prev_reset: i64,
    /// Boundary that ends the current epoch, if another epoch follows it.
    pub next_reset: Option<i64>,
    /// Expiries of superseded epochs, oldest first.
    pub history: Vec<i64>,
}

impl EpochState {
    fn is_due(&self, now: i64) -> bool {
        self.next_reset.is_some_and(|next| now >= next)
    }

    fn permanent(leaderboard_id: &str) -> Self {
        Self {
            leaderboard_id: leaderboard_id.to_string(),
            current: Epoch::PERMANENT,
            prev_reset: 0,
            next_reset: None,
            history: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloverEvent {
    pub leaderboard_id: String,
    pub previous: Epoch,
    pub current: Epoch,
    pub tournament: bool,
}

/// Observer of epoch swaps. Called outside scheduler locks.
pub trait RolloverListener: Send + Sync {
    fn on_rollover(&self, event: &RolloverEvent);
}

/// Part of an epoch during which a tournament accepts scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start: i64,
    pub end: i64,
}

impl ActiveWindow {
    pub fn for_epoch(settings: &TournamentSettings, epoch: &Epoch) -> Self {
        let start = epoch.start.max(settings.start_time);
        let mut end = start.saturating_add(settings.duration);
        if settings.end_time > 0 {
            end = end.min(settings.end_time);
        }
        if epoch.expiry > 0 {
            end = end.min(epoch.expiry);
        }
        Self { start, end }
    }

    pub fn contains(&self, now: i64) -> bool {
        now >= self.start && now < self.end
    }
}

pub struct ResetScheduler {
    cron: Arc<dyn CronClock>,
    states: RwLock<HashMap<String, Arc<EpochState>>>,
    listeners: RwLock<Vec<Arc<dyn RolloverListener>>>,
}

impl ResetScheduler {
    pub fn new(cron: Arc<dyn CronClock>) -> Self {
        Self {
            cron,
            states: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn RolloverListener>) {
        self.listeners.write().push(listener);
    }

    /// Current epoch state for `config`, rolling it forward if `now` has
    /// crossed the pending boundary.
    pub fn current(&self, config: &LeaderboardConfig, now: i64) -> Arc<EpochState> {
        if let Some(state) = self.states.read().get(&config.id) {
            if !state.is_due(now) {
                return state.clone();
            }
        }
        self.advance(config, now).0
    }

    /// Initialize or roll every given config. Returns the number of rollovers.
    pub fn tick<'a, I>(&self, configs: I, now: i64) -> usize
    where
        I: IntoIterator<Item = &'a LeaderboardConfig>,
    {
        let mut rolled = 0;
        for config in configs {
            let due = match self.states.read().get(&config.id) {
                Some(state) => state.is_due(now),
                None => true,
            };
            if due && self.advance(config, now).1 {
                rolled += 1;
            }
        }
        rolled
    }

    /// Drop all bookkeeping for a deleted config.
    pub fn forget(&self, leaderboard_id: &str) {
        self.states.write().remove(leaderboard_id);
    }

    pub fn snapshot(&self, leaderboard_id: &str) -> Option<Arc<EpochState>> {
        self.states.read().get(leaderboard_id).cloned()
    }

    /// Whether `expiry` names an epoch of `config` that has existed: the
    /// current one, one this process rolled past, or an earlier cron
    /// boundary (history does not survive restarts).
    pub fn is_known_expiry(&self, config: &LeaderboardConfig, expiry: i64, now: i64) -> bool {
        let state = self.current(config, now);
        if expiry == state.current.expiry || state.history.contains(&expiry) {
            return true;
        }
        if expiry <= 0 || (state.current.expiry > 0 && expiry > state.current.expiry) {
            return false;
        }
        if let Some(t) = &config.tournament {
            if t.end_time > 0 && expiry == t.end_time {
                return true;
            }
        }
        match config.schedule() {
            Some(expr) => self.cron.prev(expr, expiry).is_ok_and(|b| b == expiry),
            None => false,
        }
    }

    fn advance(&self, config: &LeaderboardConfig, now: i64) -> (Arc<EpochState>, bool) {
        let event;
        let state = {
            let mut states = self.states.write();
            let existing = states.get(&config.id).cloned();
            if let Some(state) = &existing {
                if !state.is_due(now) {
                    return (state.clone(), false);
                }
            }

            let computed = match compute_epoch(self.cron.as_ref(), config, now) {
                Ok(computed) => computed,
                Err(e) => {
                    warn!(leaderboard = %config.id, error = %e, "epoch evaluation failed, keeping last boundaries");
                    let kept = existing
                        .unwrap_or_else(|| Arc::new(EpochState::permanent(&config.id)));
                    states.insert(config.id.clone(), kept.clone());
                    return (kept, false);
                }
            };

            let (current, next_reset) = computed;
            let mut history = Vec::new();
            if let Some(old) = &existing {
                history = old.history.clone();
                if old.current.expiry != current.expiry {
                    history.push(old.current.expiry);
                }
            }
            let next = Arc::new(EpochState {
                leaderboard_id: config.id.clone(),
                current,
                prev_reset: current.start,
                next_reset,
                history,
            });
            states.insert(config.id.clone(), next.clone());

            event = existing
                .filter(|old| old.current != current)
                .map(|old| RolloverEvent {
                    leaderboard_id: config.id.clone(),
                    previous: old.current,
                    current,
                    tournament: config.is_tournament(),
                });
            next
        };

        match &event {
            Some(event) => {
                info!(
                    leaderboard = %event.leaderboard_id,
                    previous_expiry = event.previous.expiry,
                    expiry = event.current.expiry,
                    "epoch rolled over"
                );
                let listeners = self.listeners.read().clone();
                for listener in listeners {
                    listener.on_rollover(event);
                }
            }
            None => debug!(
                leaderboard = %config.id,
                start = state.current.start,
                expiry = state.current.expiry,
                "epoch initialized"
            ),
        }
        (state, event.is_some())
    }
}

/// Work out the epoch containing `now` and the boundary after it.
fn compute_epoch(
    cron: &dyn CronClock,
    config: &LeaderboardConfig,
    now: i64,
) -> Result<(Epoch, Option<i64>)> {
    match (config.schedule(), &config.tournament) {
        (None, None) => Ok((Epoch::PERMANENT, None)),
        (Some(expr), None) => {
            let start = cron.prev(expr, now)?;
            let next = cron.next(expr, now)?;
            Ok((Epoch { start, expiry: next }, Some(next)))
        }
        (None, Some(t)) => Ok((
            Epoch {
                start: t.start_time,
                expiry: t.end_time,
            },
            None,
        )),
        (Some(expr), Some(t)) => {
            let anchor = now.max(t.start_time);
            let next = cron.next(expr, anchor)?;
            let mut start = cron.prev(expr, anchor)?.max(t.start_time);
            let (expiry, next_reset) = if t.end_time > 0 && next >= t.end_time {
                (t.end_time, None)
            } else {
                (next, Some(next))
            };
            start = start.min(expiry);
            Ok((Epoch { start, expiry }, next_reset))
        }
    }
}
