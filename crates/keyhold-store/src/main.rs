//! Keyhold store setup binary
//!
//! Opens the configured backend, which creates any missing indices, then
//! reports what is in place. Intended as a deploy step ahead of the service.

use std::env;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use keyhold_store::{open_store, StoreConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let log_level = env::var("KEYHOLD_LOG_LEVEL")
        .unwrap_or_else(|_| "info".into())
        .parse()
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to set tracing subscriber: {e}");
        return ExitCode::FAILURE;
    }

    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        postgres = config.database_url.is_some(),
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        merge = ?config.merge_mode,
        "Opening key store"
    );

    let store = match open_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "Failed to open key store");
            return ExitCode::FAILURE;
        }
    };

    let code = match store.list_indexes().await {
        Ok(indexes) => {
            for index in &indexes {
                info!(name = %index.name, field = %index.field, unique = index.unique, "Index present");
            }
            info!(count = indexes.len(), "Key store ready");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Failed to list indexes");
            ExitCode::FAILURE
        }
    };

    store.shutdown().await;
    code
}
