//! Store configuration
//!
//! Read from `KEYHOLD_*` environment variables. Unset variables fall back to
//! defaults; set but malformed ones are errors rather than silently ignored.

use keyhold_core::MergeMode;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::error::StoreError;
use crate::storage::{KeyStore, MemoryStore};

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("KEYHOLD_DATABASE_URL is set but this build has no postgres support")]
    PostgresUnsupported,
}

/// Key store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// PostgreSQL connection string; in-memory storage when unset
    pub database_url: Option<String>,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// How long session acquisition may wait for a pooled connection
    pub acquire_timeout: Duration,
    /// Whether new material is merged into stored keys
    pub merge_mode: MergeMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            merge_mode: MergeMode::Disabled,
        }
    }
}

impl StoreConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.database_url = lookup("KEYHOLD_DATABASE_URL").filter(|url| !url.trim().is_empty());

        if let Some(value) = lookup("KEYHOLD_MAX_CONNECTIONS") {
            config.max_connections = value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    var: "KEYHOLD_MAX_CONNECTIONS",
                    expected: "a positive integer",
                    value,
                })?;
        }

        if let Some(value) = lookup("KEYHOLD_ACQUIRE_TIMEOUT_SECS") {
            let secs: u64 = value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "KEYHOLD_ACQUIRE_TIMEOUT_SECS",
                expected: "a number of seconds",
                value: value.clone(),
            })?;
            config.acquire_timeout = Duration::from_secs(secs);
        }

        if let Some(value) = lookup("KEYHOLD_MERGE") {
            config.merge_mode = value.parse().map_err(|_| ConfigError::Invalid {
                var: "KEYHOLD_MERGE",
                expected: "'none' or 'union'",
                value: value.clone(),
            })?;
        }

        Ok(config)
    }
}

/// Error opening a store
#[derive(Error, Debug)]
pub enum OpenError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Open the configured backend; index setup runs before this returns
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn KeyStore>, OpenError> {
    match &config.database_url {
        None => {
            info!(merge = ?config.merge_mode, "Using in-memory key store");
            let store = match config.merge_mode.merger() {
                Some(merger) => MemoryStore::with_merger(merger),
                None => MemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
        #[cfg(feature = "postgres")]
        Some(url) => {
            info!(merge = ?config.merge_mode, "Using PostgreSQL key store");
            let mut store = crate::storage::PostgresStore::new(
                url,
                config.max_connections,
                config.acquire_timeout,
            )
            .await?;
            if let Some(merger) = config.merge_mode.merger() {
                store = store.with_merger(merger);
            }
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => Err(ConfigError::PostgresUnsupported.into()),
    }
}
