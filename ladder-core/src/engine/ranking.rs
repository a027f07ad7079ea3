use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config_store::{CatalogPage, ConfigRepo, ConfigStore};
use crate::cron::{CronClock, CronSchedule, SystemClock, WallClock};
use crate::engine::config::EngineConfig;
use crate::engine::helpers::{check_owner, OwnerLocks};
use crate::engine::messages::{EngineStats, WriteRecord};
use crate::error::{RankingError, Result};
use crate::operator::MergeContext;
use crate::rank_cache::RankCache;
use crate::record_store::{MemoryRecordStore, RecordStore};
use crate::scheduler::{ActiveWindow, EpochState, ResetScheduler, RolloverListener};
use crate::types::{Epoch, LeaderboardConfig, LeaderboardRecord, Operator, TournamentSettings};

#[derive(Default)]
pub(super) struct EngineCounters {
    pub(super) cache_rebuilds: AtomicU64,
    pub(super) record_writes: AtomicU64,
    pub(super) cache_write_failures: AtomicU64,
}

/// Leaderboard and tournament ranking engine.
///
/// Owns the config catalog, the rank cache and the reset scheduler; records
/// live behind the `RecordStore` seam. All methods take `&self` and are safe
/// to call from many threads at once.
pub struct RankingEngine {
    pub(super) configs: ConfigStore,
    pub(super) records: Arc<dyn RecordStore>,
    pub(super) cache: RankCache,
    pub(super) scheduler: ResetScheduler,
    pub(super) cron: Arc<dyn CronClock>,
    pub(super) clock: Arc<dyn WallClock>,
    pub(super) settings: EngineConfig,
    pub(super) owner_locks: OwnerLocks,
    pub(super) counters: EngineCounters,
}

impl RankingEngine {
    pub fn new(
        records: Arc<dyn RecordStore>,
        config_repo: Arc<dyn ConfigRepo>,
        settings: EngineConfig,
    ) -> Result<Self> {
        let configs = ConfigStore::new(config_repo)?;
        let cron: Arc<dyn CronClock> = Arc::new(CronSchedule::new());
        let cache = RankCache::new(settings.rank_cache_seed);
        for cfg in configs.all() {
            if !cfg.enable_ranks {
                cache.disable(&cfg.id);
            }
        }
        Ok(Self {
            configs,
            records,
            cache,
            scheduler: ResetScheduler::new(cron.clone()),
            cron,
            clock: Arc::new(SystemClock),
            owner_locks: OwnerLocks::new(settings.write_lock_stripes),
            settings,
            counters: EngineCounters::default(),
        })
    }

    /// Engine over an in-memory record store with no config persistence.
    pub fn in_memory(settings: EngineConfig) -> Self {
        let cron: Arc<dyn CronClock> = Arc::new(CronSchedule::new());
        Self {
            configs: ConfigStore::in_memory(),
            records: Arc::new(MemoryRecordStore::new()),
            cache: RankCache::new(settings.rank_cache_seed),
            scheduler: ResetScheduler::new(cron.clone()),
            cron,
            clock: Arc::new(SystemClock),
            owner_locks: OwnerLocks::new(settings.write_lock_stripes),
            settings,
            counters: EngineCounters::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn WallClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Swap the cron evaluator. Resets scheduler state, so call it before
    /// registering rollover listeners.
    pub fn with_cron(mut self, cron: Arc<dyn CronClock>) -> Self {
        self.scheduler = ResetScheduler::new(cron.clone());
        self.cron = cron;
        self
    }

    pub fn add_rollover_listener(&self, listener: Arc<dyn RolloverListener>) {
        self.scheduler.add_listener(listener);
    }

    pub fn settings(&self) -> &EngineConfig {
        &self.settings
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    // =====================================================
    // Config catalog
    // =====================================================

    /// Create a leaderboard or tournament. Idempotent: an existing config
    /// with the same id is returned unchanged with `created = false`.
    pub fn create_leaderboard(
        &self,
        mut config: LeaderboardConfig,
    ) -> Result<(Arc<LeaderboardConfig>, bool)> {
        config.validate(self.cron.as_ref())?;
        if config.create_time == 0 {
            config.create_time = self.now();
        }
        let (config, created) = self.configs.create(config)?;
        if created {
            if !config.enable_ranks {
                self.cache.disable(&config.id);
            }
            info!(
                leaderboard = %config.id,
                order = %config.sort_order,
                operator = %config.operator,
                tournament = config.is_tournament(),
                "leaderboard created"
            );
        }
        Ok((config, created))
    }

    pub fn get_leaderboard(&self, id: &str) -> Result<Arc<LeaderboardConfig>> {
        self.configs.get(id)
    }

    pub fn get_leaderboards(&self, ids: &[String]) -> Vec<Arc<LeaderboardConfig>> {
        self.configs.get_multiple(ids)
    }

    pub fn list_leaderboards(&self, limit: usize, cursor: Option<&str>) -> Result<CatalogPage> {
        self.configs.list(limit, cursor, |_| true)
    }

    /// Delete a config and everything hanging off it: cached ranks for all
    /// epochs, stored records and scheduler state.
    pub fn delete_leaderboard(&self, id: &str) -> Result<()> {
        self.configs.remove(id)?;
        self.cache.drop_all(id);
        self.scheduler.forget(id);
        let purged = self.records.delete_all(id)?;
        info!(leaderboard = id, purged, "leaderboard deleted");
        Ok(())
    }

    /// Turn rank tracking off and free its memory. Listings keep working via
    /// sorted store scans, without ranks.
    pub fn disable_ranks(&self, id: &str) -> Result<()> {
        self.configs.set_enable_ranks(id, false)?;
        self.cache.disable(id);
        Ok(())
    }

    /// Turn rank tracking back on; epochs rebuild from the store on demand.
    pub fn enable_ranks(&self, id: &str) -> Result<()> {
        self.configs.set_enable_ranks(id, true)?;
        self.cache.enable(id);
        Ok(())
    }

    // =====================================================
    // Records
    // =====================================================

    /// Submit a score. Merges with the owner's record in the current epoch
    /// using the effective operator and returns the stored record with its
    /// rank (when ranks are enabled).
    pub fn record_write(&self, request: WriteRecord) -> Result<LeaderboardRecord> {
        check_owner(&request.owner_id)?;
        let cfg = self.configs.get(&request.leaderboard_id)?;
        let now = self.now();
        let epoch = self.epoch(&cfg, now).current;

        let guard = self.owner_locks.lock(&cfg.id, &request.owner_id);
        let existing = self.records.get(&cfg.id, epoch.expiry, &request.owner_id)?;
        if let Some(t) = &cfg.tournament {
            self.check_tournament_write(&cfg, t, &epoch, existing.as_ref(), now)?;
        }

        let operator = request.override_operator.resolve(cfg.operator);
        let ctx = MergeContext {
            order: cfg.sort_order,
            decrement_floor: cfg.decrement_floor,
        };
        // A joined owner's zero record holds no submission yet.
        let submitted = existing.as_ref().filter(|r| r.num_score > 0);
        let stored = submitted.map(LeaderboardRecord::scores);
        let merged = operator.merge(&ctx, stored, (request.score, request.subscore));

        let is_new = submitted.is_none();
        let max_num_score = cfg.tournament.as_ref().map_or(0, |t| t.max_num_score);
        let mut record = existing.unwrap_or_else(|| {
            LeaderboardRecord::fresh(&cfg.id, &request.owner_id, &epoch, max_num_score, now)
        });
        let changed = merged != record.scores();
        record.score = merged.0;
        record.subscore = merged.1;
        record.num_score = record.num_score.saturating_add(1);
        record.update_time = now;
        if let Some(username) = request.username.filter(|u| !u.is_empty()) {
            record.username = Some(username);
        }
        if let Some(metadata) = request.metadata {
            if is_new || changed || operator != Operator::Best {
                record.metadata = metadata;
            }
        }

        self.records.upsert(&record)?;
        self.counters.record_writes.fetch_add(1, Ordering::Relaxed);
        self.index(&cfg, epoch.expiry, &record);
        drop(guard);

        debug!(
            leaderboard = %cfg.id,
            owner = %record.owner_id,
            score = record.score,
            subscore = record.subscore,
            %operator,
            "record written"
        );
        record.rank = self.rank_of(&cfg, epoch.expiry, &record.owner_id);
        Ok(record)
    }

    /// Remove an owner's record from the current epoch.
    pub fn record_delete(&self, leaderboard_id: &str, owner_id: &str) -> Result<()> {
        check_owner(owner_id)?;
        let cfg = self.configs.get(leaderboard_id)?;
        let expiry = self.epoch(&cfg, self.now()).current.expiry;

        let _guard = self.owner_locks.lock(&cfg.id, owner_id);
        if !self.records.delete(&cfg.id, expiry, owner_id)? {
            return Err(RankingError::not_found(format!("record for owner {owner_id}")));
        }
        if self.ranks_enabled(&cfg) {
            if let Err(e) = self.cache.remove(&cfg.id, expiry, owner_id) {
                warn!(leaderboard = %cfg.id, owner = owner_id, error = %e, "rank cache removal failed");
            }
        }
        debug!(leaderboard = %cfg.id, owner = owner_id, "record deleted");
        Ok(())
    }

    /// Roll every config whose boundary has passed. Returns rollover count.
    pub fn run_scheduler_tick(&self) -> usize {
        let configs = self.configs.all();
        self.scheduler
            .tick(configs.iter().map(|cfg| cfg.as_ref()), self.now())
    }

    /// Current epoch bookkeeping for a leaderboard.
    pub fn epoch_state(&self, id: &str) -> Result<Arc<EpochState>> {
        let cfg = self.configs.get(id)?;
        Ok(self.epoch(&cfg, self.now()))
    }

    pub fn stats(&self) -> EngineStats {
        let configs = self.configs.all();
        EngineStats {
            leaderboards: configs.len(),
            tournaments: configs.iter().filter(|c| c.is_tournament()).count(),
            rank_buckets: self.cache.bucket_count(),
            cache_rebuilds: self.counters.cache_rebuilds.load(Ordering::Relaxed),
            record_writes: self.counters.record_writes.load(Ordering::Relaxed),
            cache_write_failures: self.counters.cache_write_failures.load(Ordering::Relaxed),
        }
    }

    // =====================================================
    // Internals shared by the listing and tournament paths
    // =====================================================

    pub(super) fn epoch(&self, cfg: &LeaderboardConfig, now: i64) -> Arc<EpochState> {
        self.scheduler.current(cfg, now)
    }

    pub(super) fn ranks_enabled(&self, cfg: &LeaderboardConfig) -> bool {
        cfg.enable_ranks && self.cache.is_enabled(&cfg.id)
    }

    /// Load an epoch's bucket from the store if it has not been built yet.
    pub(super) fn prepare_bucket(&self, cfg: &LeaderboardConfig, expiry: i64) -> Result<()> {
        let records = &self.records;
        let built = self.cache.prepare(&cfg.id, expiry, cfg.sort_order, || {
            records
                .scan_epoch(&cfg.id, expiry)
                .map(|rows| rows.iter().map(LeaderboardRecord::rank_key).collect())
        })?;
        if built {
            self.counters.cache_rebuilds.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Ranks available for this epoch right now. A failed rebuild degrades
    /// to the unranked path instead of failing the caller.
    pub(super) fn ranked(&self, cfg: &LeaderboardConfig, expiry: i64) -> bool {
        if !self.ranks_enabled(cfg) {
            return false;
        }
        match self.prepare_bucket(cfg, expiry) {
            Ok(()) => true,
            Err(e) => {
                warn!(leaderboard = %cfg.id, expiry, error = %e, "rank bucket unavailable");
                false
            }
        }
    }

    /// Best-effort cache update after an authoritative store write.
    pub(super) fn index(&self, cfg: &LeaderboardConfig, expiry: i64, record: &LeaderboardRecord) {
        if !self.ranks_enabled(cfg) {
            return;
        }
        let result = self.prepare_bucket(cfg, expiry).and_then(|()| {
            self.cache.upsert(
                &cfg.id,
                expiry,
                cfg.sort_order,
                &record.owner_id,
                record.score,
                record.subscore,
            )
        });
        if let Err(e) = result {
            self.counters
                .cache_write_failures
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                leaderboard = %cfg.id,
                owner = %record.owner_id,
                error = %e,
                "rank cache update failed, ranks degraded"
            );
        }
    }

    pub(super) fn rank_of(&self, cfg: &LeaderboardConfig, expiry: i64, owner_id: &str) -> Option<i64> {
        if !self.ranked(cfg, expiry) {
            return None;
        }
        self.cache.get_rank(&cfg.id, expiry, owner_id).ok()
    }

    /// Attach current ranks to records of one epoch.
    pub(super) fn attach_ranks(
        &self,
        cfg: &LeaderboardConfig,
        expiry: i64,
        records: &mut [LeaderboardRecord],
    ) {
        if !self.ranked(cfg, expiry) {
            return;
        }
        for record in records {
            record.rank = self.cache.get_rank(&cfg.id, expiry, &record.owner_id).ok();
        }
    }

    pub(super) fn check_tournament_write(
        &self,
        cfg: &LeaderboardConfig,
        settings: &TournamentSettings,
        epoch: &Epoch,
        existing: Option<&LeaderboardRecord>,
        now: i64,
    ) -> Result<()> {
        if !ActiveWindow::for_epoch(settings, epoch).contains(now) {
            return Err(RankingError::TournamentNotActive(cfg.id.clone()));
        }
        match existing {
            Some(record) => {
                // Unlimited is a tournament property; a personal cap of 0
                // means no attempts left.
                if settings.max_num_score > 0 && record.num_score >= record.max_num_score {
                    return Err(RankingError::AttemptsExceeded);
                }
            }
            None => {
                if settings.join_required {
                    return Err(RankingError::JoinRequired(cfg.id.clone()));
                }
                self.check_capacity(cfg, settings, epoch.expiry)?;
            }
        }
        Ok(())
    }

    pub(super) fn check_capacity(
        &self,
        cfg: &LeaderboardConfig,
        settings: &TournamentSettings,
        expiry: i64,
    ) -> Result<()> {
        if settings.max_size > 0 && self.records.count(&cfg.id, expiry)? >= u64::from(settings.max_size) {
            return Err(RankingError::TournamentFull(cfg.id.clone()));
        }
        Ok(())
    }
}
