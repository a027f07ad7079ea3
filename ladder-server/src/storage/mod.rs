//! Storage Layer - persistence backends for the ranking engine
//!
//! ```text
//! RankingEngine
//!   ├── RecordStore ──┐
//!   └── ConfigRepo  ──┴──► LmdbStore (LMDB_PATH set)
//!                      └─► MemoryRecordStore + EphemeralConfigRepo (no path)
//! ```

pub mod lmdb_store;

use std::sync::Arc;
use tracing::info;

use ladder_core::{
    ConfigRepo, EphemeralConfigRepo, MemoryRecordStore, RankingEngine, RecordStore,
};

use self::lmdb_store::{LmdbStore, LmdbStoreError};
use crate::config::ServerConfig;

/// Engine plus the LMDB handle backing it, if any.
pub struct Storage {
    pub engine: Arc<RankingEngine>,
    pub lmdb: Option<Arc<LmdbStore>>,
}

/// Open the configured backend and build the engine over it.
pub fn init_storage(config: &ServerConfig) -> Result<Storage, StorageInitError> {
    let (records, repo, lmdb): (Arc<dyn RecordStore>, Arc<dyn ConfigRepo>, _) = match &config.lmdb_path {
        Some(path) => {
            let store = Arc::new(LmdbStore::new(path, config.lmdb_max_size)?);
            (store.clone(), store.clone(), Some(store))
        }
        None => {
            info!("no LMDB_PATH configured, records are kept in memory only");
            (
                Arc::new(MemoryRecordStore::new()),
                Arc::new(EphemeralConfigRepo),
                None,
            )
        }
    };
    let engine = RankingEngine::new(records, repo, config.engine.clone())?;
    Ok(Storage {
        engine: Arc::new(engine),
        lmdb,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum StorageInitError {
    #[error(transparent)]
    Lmdb(#[from] LmdbStoreError),
    #[error(transparent)]
    Engine(#[from] ladder_core::RankingError),
}
