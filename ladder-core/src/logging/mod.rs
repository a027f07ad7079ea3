//! Structured logging setup
//!
//! Everything logs through `tracing` macros; this module only installs the
//! subscriber. Default per-module levels come from `TracingConfig`, and a
//! `RUST_LOG` in the environment replaces them wholesale.
//!
//! Initialization is idempotent: the first call wins, later calls are no-ops,
//! so tests and embedding hosts can call it freely.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Once;
use tracing_subscriber::EnvFilter;

use crate::error::RankingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = RankingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(RankingError::invalid(format!("unknown log level '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    pub default_level: LogLevel,
    pub module_filters: Vec<(String, LogLevel)>,
    pub show_thread_ids: bool,
    pub show_targets: bool,
    pub show_file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: LogLevel::Info,
            module_filters: vec![
                ("ladder_core::rank_cache".to_string(), LogLevel::Info),
                ("ladder_core::scheduler".to_string(), LogLevel::Info),
                ("ladder_core::engine".to_string(), LogLevel::Info),
                ("tower_http".to_string(), LogLevel::Warn),
            ],
            show_thread_ids: false,
            show_targets: true,
            show_file_line: false,
        }
    }
}

impl TracingConfig {
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }

    pub fn to_env_filter_string(&self) -> String {
        let mut parts = vec![self.default_level.as_str().to_string()];
        for (module, level) in &self.module_filters {
            parts.push(format!("{}={}", module, level.as_str()));
        }
        parts.join(",")
    }
}

static TRACING_INIT: Once = Once::new();

pub fn init_tracing_default() {
    init_tracing(&TracingConfig::default());
}

/// Install the global subscriber (first call wins).
pub fn init_tracing(config: &TracingConfig) {
    let filter_str = config.to_env_filter_string();
    let config = config.clone();
    TRACING_INIT.call_once(move || {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(config.show_targets)
            .with_thread_ids(config.show_thread_ids)
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .compact();

        // Another subscriber may already be installed by the host process.
        let _ = subscriber.try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_env_filter_string() {
        let filter = TracingConfig::default().to_env_filter_string();
        assert!(filter.starts_with("info"));
        assert!(filter.contains("ladder_core::engine=info"));
        assert!(filter.contains("tower_http=warn"));
    }

    #[test]
    fn test_with_level() {
        let config = TracingConfig::default().with_level(LogLevel::Trace);
        assert!(config.to_env_filter_string().starts_with("trace"));
    }

    #[test]
    fn test_partial_json_config() {
        let config: TracingConfig =
            serde_json::from_str(r#"{"default_level": "warn", "module_filters": []}"#).unwrap();
        assert_eq!(config.default_level, LogLevel::Warn);
        assert_eq!(config.to_env_filter_string(), "warn");
        assert!(config.show_targets);
    }

    #[test]
    fn test_init_tracing_idempotent() {
        init_tracing_default();
        init_tracing_default();
        init_tracing(&TracingConfig::default().with_level(LogLevel::Debug));
    }
}
