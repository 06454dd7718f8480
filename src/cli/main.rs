use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use quantive_okr::config::{ConfigManager, LogLevel};
use quantive_okr::quantive::ReqwestTransport;
use quantive_okr::shared::logging;
use quantive_okr::shared::store::{default_store_path, expand_path, FilePropertyStore};

#[derive(Parser)]
#[command(name = "quantive-okr")]
#[command(about = "Manage Quantive OKR settings and query the Quantive Results API")]
#[command(version)]
struct Args {
    /// Path of the JSON property store
    #[arg(long, env = "QUANTIVE_OKR_STORE", global = true)]
    store: Option<String>,

    /// Override the Quantive API base URL
    #[arg(long, env = "QUANTIVE_OKR_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Also write logs to this directory
    #[arg(long, env = "QUANTIVE_OKR_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read or change stored properties
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Check that the stored credentials are usable
    Validate,
    /// List sessions
    Sessions,
    /// Show one session
    Session { id: String },
    /// List objectives of a session (defaults to the configured session)
    Objectives {
        #[arg(long)]
        session: Option<String>,
    },
    /// List key results of an objective
    KeyResults { objective_id: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    Get { key: String },
    Set { key: String, value: String },
    /// Print the resolved configuration with the token masked
    Show,
    /// Delete every stored property
    Reset,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = run(args).await {
        error!("{err:#}");
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let store_path = args
        .store
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(default_store_path);
    let store = FilePropertyStore::open(&store_path)
        .with_context(|| format!("failed to open property store {}", store_path.display()))?;

    let transport = ReqwestTransport::new().context("failed to build HTTP client")?;
    let mut manager = ConfigManager::new(Arc::new(store), Arc::new(transport));
    if let Some(url) = args.base_url {
        manager = manager.with_base_url(url);
    }

    let level = manager
        .read_config()
        .map(|c| c.log_level)
        .unwrap_or_default();
    init_logging(args.log_dir.as_deref(), level)?;

    match args.command {
        Command::Config { action } => run_config(&manager, action).await,
        Command::Validate => {
            manager.validate_config()?;
            let config = manager.get_config().await?;
            info!(session_id = %config.session_id, "configuration is valid");
            println!("Configuration is valid (session {})", config.session_id);
            Ok(())
        }
        Command::Sessions => print_json(&manager.api_client()?.get_sessions().await?),
        Command::Session { id } => print_json(&manager.api_client()?.get_session(&id).await?),
        Command::Objectives { session } => {
            let session_id = match session {
                Some(id) => id,
                None => manager.get_config().await?.session_id,
            };
            print_json(&manager.api_client()?.get_objectives(&session_id).await?)
        }
        Command::KeyResults { objective_id } => print_json(
            &manager
                .api_client()?
                .get_key_results(&objective_id)
                .await?,
        ),
    }
}

async fn run_config(manager: &ConfigManager, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            println!("{}", manager.get_property(&key, "")?);
        }
        ConfigAction::Set { key, value } => {
            manager.set_property(&key, &value)?;
            info!(%key, "property saved");
        }
        ConfigAction::Show => {
            let config = match manager.get_config().await {
                Ok(config) => config,
                Err(err) => {
                    warn!("Showing stored configuration, session lookup failed: {err}");
                    manager.read_config()?
                }
            };
            print_json(&config.redacted())?;
        }
        ConfigAction::Reset => {
            manager.delete_all_properties()?;
            println!("All properties deleted");
        }
    }
    Ok(())
}

fn init_logging(log_dir: Option<&std::path::Path>, level: LogLevel) -> Result<()> {
    logging::init_logging(log_dir, "quantive-okr", level.as_directive())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
