//! Server configuration from environment variables
//!
//! | Variable                  | Default | Meaning                                  |
//! |---------------------------|---------|------------------------------------------|
//! | `API_PORT`                | 50051   | HTTP listen port                         |
//! | `LMDB_PATH`               | unset   | LMDB directory; unset = in-memory store  |
//! | `LMDB_MAX_SIZE`           | 500MB   | LMDB map size, rounded up to a page      |
//! | `SCHEDULER_INTERVAL_SECS` | 30      | Reset scheduler tick period              |
//! | `LADDER_CONFIG`           | unset   | JSON file with `EngineConfig` overrides  |

use std::path::Path;
use tracing::warn;

use ladder_core::EngineConfig;

/// LMDB requires map size to be a multiple of the OS page size.
const PAGE_SIZE: usize = 4096;
const DEFAULT_PORT: u16 = 50051;
const DEFAULT_LMDB_MAX_SIZE: usize = 500_000_000;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub api_port: u16,
    pub lmdb_path: Option<String>,
    pub lmdb_max_size: usize,
    pub engine: EngineConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid engine config in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: DEFAULT_PORT,
            lmdb_path: None,
            lmdb_max_size: page_align(DEFAULT_LMDB_MAX_SIZE),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ServerConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable numbers fall
    /// back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut engine = match lookup("LADDER_CONFIG").filter(|p| !p.trim().is_empty()) {
            Some(path) => load_engine_config(&path)?,
            None => EngineConfig::default(),
        };
        if let Some(secs) = parse_var(&lookup, "SCHEDULER_INTERVAL_SECS") {
            engine.scheduler_interval_secs = secs;
        }

        Ok(Self {
            api_port: parse_var(&lookup, "API_PORT").unwrap_or(DEFAULT_PORT),
            lmdb_path: lookup("LMDB_PATH").filter(|p| !p.trim().is_empty()),
            lmdb_max_size: page_align(
                parse_var(&lookup, "LMDB_MAX_SIZE").unwrap_or(DEFAULT_LMDB_MAX_SIZE),
            ),
            engine,
        })
    }
}

pub fn load_engine_config(path: impl AsRef<Path>) -> Result<EngineConfig, ServerConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ServerConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ServerConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

pub fn page_align(size: usize) -> usize {
    size.div_ceil(PAGE_SIZE) * PAGE_SIZE
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = key, value = %raw, "ignoring unparseable value");
            None
        }
    }
}
