pub mod config;
pub mod credentials;
pub mod db;
pub mod errors;
pub mod github;
pub mod models;
pub mod range_store;
pub mod redaction;
pub mod runner;
pub mod series;

use crate::config::SyncConfig;
use crate::db::Database;
use crate::errors::AppResult;
use crate::github::{GitHubClient, TokenCache};
use crate::models::SyncOutcome;
use crate::range_store::{MemoryRangeStore, RangeStore};
use crate::runner::SyncRunner;
use chrono::NaiveDate;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Syncs every metric into the configured SQLite store.
pub fn run_sync(config: &SyncConfig, today: Option<NaiveDate>) -> AppResult<Vec<SyncOutcome>> {
    let plan = config.plan()?;
    let client = build_client(config)?;
    let store = Database::new(&config.store_path)?;
    tracing::info!(store = %store.path().display(), "opened store");

    let runner = SyncRunner::new(client, store, plan);
    let runner = match today {
        Some(today) => runner.with_today(today),
        None => runner,
    };
    runner.run_all()
}

/// Runs the sync against an in-memory copy of the configured sheets and
/// returns that copy; the SQLite store is not modified.
pub fn run_dry_sync(
    config: &SyncConfig,
    today: Option<NaiveDate>,
) -> AppResult<(Vec<SyncOutcome>, MemoryRangeStore)> {
    let plan = config.plan()?;
    let client = build_client(config)?;

    let store = MemoryRangeStore::new();
    if config.store_path.exists() {
        let db = Database::new(&config.store_path)?;
        for sheet in config.sheet_names() {
            store.load_sheet(&sheet, &db.read_sheet(&sheet)?)?;
        }
    }

    let runner = SyncRunner::new(client, store, plan);
    let runner = match today {
        Some(today) => runner.with_today(today),
        None => runner,
    };
    let outcomes = runner.run_all()?;
    Ok((outcomes, runner.into_store()))
}

fn build_client(config: &SyncConfig) -> AppResult<GitHubClient> {
    let credentials = credentials::resolve_credentials(&config.app)?;
    GitHubClient::new(&config.api_base_url, credentials, TokenCache::new())
}

/// JSON logs to a daily-rolling file when `log_dir` is set, plain logs to stderr otherwise.
pub fn init_tracing(log_dir: Option<&Path>) -> Result<(), String> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir).map_err(|error| error.to_string())?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "sync.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(non_blocking)
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    }
    .map_err(|error| error.to_string())
}
