//! Leaderboard and tournament configuration catalog
//!
//! ```text
//! ConfigStore
//!   ├── BTreeMap<id, Arc<LeaderboardConfig>>   (lexicographic catalog order)
//!   └── ConfigRepo                              (write-through persistence)
//! ```
//!
//! Configs are immutable snapshots: readers clone the `Arc`, and the few
//! side-operations that touch a config (rank enable/disable) swap in a new
//! snapshot.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cursor::{non_empty, CatalogCursor};
use crate::error::{RankingError, Result};
use crate::record_store::StoreResult;
use crate::types::LeaderboardConfig;

/// Hard cap on catalog page size.
pub const MAX_CATALOG_LIMIT: usize = 100;

/// Durable home for configs, loaded once at startup.
pub trait ConfigRepo: Send + Sync {
    fn load_all(&self) -> StoreResult<Vec<LeaderboardConfig>>;
    fn put(&self, config: &LeaderboardConfig) -> StoreResult<()>;
    fn delete(&self, id: &str) -> StoreResult<()>;
}

/// Repo that keeps nothing; configs live only as long as the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct EphemeralConfigRepo;

impl ConfigRepo for EphemeralConfigRepo {
    fn load_all(&self) -> StoreResult<Vec<LeaderboardConfig>> {
        Ok(Vec::new())
    }

    fn put(&self, _config: &LeaderboardConfig) -> StoreResult<()> {
        Ok(())
    }

    fn delete(&self, _id: &str) -> StoreResult<()> {
        Ok(())
    }
}

/// One catalog page plus the token for the next one.
#[derive(Debug, Clone)]
pub struct CatalogPage {
    pub configs: Vec<Arc<LeaderboardConfig>>,
    pub next_cursor: Option<String>,
}

pub struct ConfigStore {
    configs: RwLock<BTreeMap<String, Arc<LeaderboardConfig>>>,
    repo: Arc<dyn ConfigRepo>,
}

impl ConfigStore {
    /// Open the catalog, loading everything the repo has persisted.
    pub fn new(repo: Arc<dyn ConfigRepo>) -> Result<Self> {
        let loaded = repo.load_all()?;
        let count = loaded.len();
        let configs = loaded
            .into_iter()
            .map(|cfg| (cfg.id.clone(), Arc::new(cfg)))
            .collect();
        if count > 0 {
            info!(count, "loaded leaderboard configs");
        }
        Ok(Self {
            configs: RwLock::new(configs),
            repo,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            configs: RwLock::new(BTreeMap::new()),
            repo: Arc::new(EphemeralConfigRepo),
        }
    }

    /// Insert `config` unless the id is taken. An existing config is returned
    /// untouched with `created = false`.
    pub fn create(&self, config: LeaderboardConfig) -> Result<(Arc<LeaderboardConfig>, bool)> {
        let mut configs = self.configs.write();
        if let Some(existing) = configs.get(&config.id) {
            debug!(leaderboard = %config.id, "config already exists");
            return Ok((existing.clone(), false));
        }
        self.repo.put(&config)?;
        let config = Arc::new(config);
        configs.insert(config.id.clone(), config.clone());
        Ok((config, true))
    }

    pub fn get(&self, id: &str) -> Result<Arc<LeaderboardConfig>> {
        self.configs
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RankingError::not_found(format!("leaderboard {id}")))
    }

    /// Configs for the ids that exist; unknown ids are dropped.
    pub fn get_multiple(&self, ids: &[String]) -> Vec<Arc<LeaderboardConfig>> {
        let configs = self.configs.read();
        ids.iter().filter_map(|id| configs.get(id).cloned()).collect()
    }

    pub fn remove(&self, id: &str) -> Result<Arc<LeaderboardConfig>> {
        let mut configs = self.configs.write();
        if !configs.contains_key(id) {
            return Err(RankingError::not_found(format!("leaderboard {id}")));
        }
        self.repo.delete(id)?;
        configs
            .remove(id)
            .ok_or_else(|| RankingError::not_found(format!("leaderboard {id}")))
    }

    /// Swap in a modified copy of a config.
    pub fn update<F>(&self, id: &str, apply: F) -> Result<Arc<LeaderboardConfig>>
    where
        F: FnOnce(&mut LeaderboardConfig),
    {
        let mut configs = self.configs.write();
        let current = configs
            .get(id)
            .ok_or_else(|| RankingError::not_found(format!("leaderboard {id}")))?;
        let mut next = LeaderboardConfig::clone(current);
        apply(&mut next);
        if next == **current {
            return Ok(current.clone());
        }
        self.repo.put(&next)?;
        let next = Arc::new(next);
        configs.insert(id.to_string(), next.clone());
        Ok(next)
    }

    pub fn set_enable_ranks(&self, id: &str, enabled: bool) -> Result<Arc<LeaderboardConfig>> {
        self.update(id, |cfg| cfg.enable_ranks = enabled)
    }

    /// Page through configs in id order, keeping those accepted by `filter`.
    pub fn list<F>(&self, limit: usize, cursor: Option<&str>, filter: F) -> Result<CatalogPage>
    where
        F: Fn(&LeaderboardConfig) -> bool,
    {
        if limit == 0 || limit > MAX_CATALOG_LIMIT {
            return Err(RankingError::invalid(format!(
                "limit must be between 1 and {MAX_CATALOG_LIMIT}"
            )));
        }
        let after = match non_empty(cursor) {
            Some(token) => Some(CatalogCursor::decode(token)?.last_seen_id),
            None => None,
        };
        let lower = match &after {
            Some(id) => Bound::Excluded(id.as_str()),
            None => Bound::Unbounded,
        };

        let configs = self.configs.read();
        let mut page: Vec<Arc<LeaderboardConfig>> = configs
            .range::<str, _>((lower, Bound::Unbounded))
            .map(|(_, cfg)| cfg)
            .filter(|cfg| filter(cfg))
            .take(limit + 1)
            .cloned()
            .collect();

        let next_cursor = if page.len() > limit {
            page.truncate(limit);
            page.last().map(|cfg| {
                CatalogCursor {
                    last_seen_id: cfg.id.clone(),
                }
                .encode()
            })
        } else {
            None
        };
        Ok(CatalogPage {
            configs: page,
            next_cursor,
        })
    }

    /// Snapshot of every config, in id order.
    pub fn all(&self) -> Vec<Arc<LeaderboardConfig>> {
        self.configs.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }
}
