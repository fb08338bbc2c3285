//! Runtime configuration for embedding the tree core.
//!
//! Values come from environment variables; blank values count as unset.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "NODETREE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "NODETREE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "NODETREE_LOG_DIR";

/// Core runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite file; `None` selects an in-memory database.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute log directory; `None` leaves logging uninitialised.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };
        let defaults = Self::default();
        Self {
            db_path: value(ENV_DB_PATH).map(PathBuf::from),
            log_level: value(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: value(ENV_LOG_DIR).map(PathBuf::from),
        }
    }
}
