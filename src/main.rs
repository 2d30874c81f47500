use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use traffic_ledger_lib::config::{SyncConfig, DEFAULT_CONFIG_PATH};
use traffic_ledger_lib::credentials;
use traffic_ledger_lib::db::Database;
use traffic_ledger_lib::models::CellValue;
use traffic_ledger_lib::range_store::RangeStore;

/// Syncs GitHub stargazers and traffic into a gap-free ledger.
#[derive(Debug, Parser)]
#[command(name = "traffic-ledger", version)]
struct Cli {
    /// YAML configuration file.
    #[arg(
        long,
        short,
        global = true,
        env = "TRAFFIC_LEDGER_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch every metric and write it into the store.
    Sync {
        /// UTC day treated as today (YYYY-MM-DD).
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Run against an in-memory copy and print the resulting sheets.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print a sheet as tab-separated rows.
    Dump {
        #[arg(long)]
        sheet: String,
    },

    /// Manage the GitHub App private key in the OS keyring.
    Credentials {
        #[command(subcommand)]
        action: CredentialsAction,
    },
}

#[derive(Debug, Subcommand)]
enum CredentialsAction {
    /// Store a PEM private key read from a file.
    Set {
        #[arg(long)]
        key_file: PathBuf,
    },
    /// Remove the stored private key.
    Clear,
    /// Report whether a private key is stored.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config =
        SyncConfig::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
    traffic_ledger_lib::init_tracing(config.log_dir.as_deref()).map_err(anyhow::Error::msg)?;

    match cli.command {
        Command::Sync { today, dry_run: false } => {
            let outcomes = traffic_ledger_lib::run_sync(&config, today)?;
            for outcome in &outcomes {
                println!("{}", serde_json::to_string(outcome)?);
            }
        }
        Command::Sync { today, dry_run: true } => {
            let (outcomes, store) = traffic_ledger_lib::run_dry_sync(&config, today)?;
            for outcome in &outcomes {
                println!("{}", serde_json::to_string(outcome)?);
            }
            for sheet in config.sheet_names() {
                println!("== {} ==", sheet);
                print_rows(&store.read_sheet(&sheet)?);
            }
        }
        Command::Dump { sheet } => {
            let db = Database::new(&config.store_path)?;
            print_rows(&db.read_sheet(&sheet)?);
        }
        Command::Credentials { action } => {
            let app_id = std::env::var(credentials::APP_ID_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| config.app.app_id.clone());
            if app_id.trim().is_empty() {
                bail!("GitHub App id missing: set app.app_id or {}", credentials::APP_ID_ENV);
            }
            run_credentials(action, app_id.trim())?;
        }
    }

    Ok(())
}

fn run_credentials(action: CredentialsAction, app_id: &str) -> Result<()> {
    match action {
        CredentialsAction::Set { key_file } => {
            let pem = std::fs::read_to_string(&key_file)
                .with_context(|| format!("reading {}", key_file.display()))?;
            credentials::save_private_key(app_id, &pem)?;
            println!("stored private key for app {}", app_id);
        }
        CredentialsAction::Clear => {
            if credentials::clear_private_key(app_id)? {
                println!("removed private key for app {}", app_id);
            } else {
                println!("no private key stored for app {}", app_id);
            }
        }
        CredentialsAction::Status => {
            let stored = credentials::has_private_key(app_id)?;
            let state = if stored { "stored" } else { "not stored" };
            println!("app {}: private key {}", app_id, state);
        }
    }
    Ok(())
}

fn print_rows(rows: &[Vec<CellValue>]) {
    for row in rows {
        let line = row.iter().map(ToString::to_string).collect::<Vec<_>>().join("\t");
        println!("{}", line);
    }
}
