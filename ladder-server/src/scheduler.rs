//! Background reset scheduler
//!
//! Epochs also roll lazily on access; the periodic tick makes sure idle
//! leaderboards reset (and rollover listeners fire) close to their cron
//! boundary even when nobody reads or writes them.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use ladder_core::RankingEngine;

/// Spawn the tick loop. It exits when `shutdown` flips to `true` or its
/// sender is dropped.
pub fn spawn_scheduler(
    engine: Arc<RankingEngine>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_secs = period.as_secs(), "reset scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let rolled = engine.run_scheduler_tick();
                    if rolled > 0 {
                        debug!(rolled, "scheduler tick rolled epochs");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("reset scheduler stopped");
    })
}
