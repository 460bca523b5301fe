//! Command-line interface for the Notion file synchronization client.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;

use notion_sync_core::config::SyncConfig;

mod commands;
mod output;

pub use commands::*;
pub use output::*;

static LOGGING: OnceCell<()> = OnceCell::new();

/// Initialize logging once. `RUST_LOG` overrides the verbosity picked here.
pub fn init_logging(verbose: bool) {
    let _ = LOGGING.get_or_init(|| {
        let default_level = if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::default().add_directive(default_level.into()));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init();
    });
}

/// CLI arguments parser
#[derive(Parser)]
#[command(name = "notion-sync", author, version, about = "Synchronize a local directory with Notion pages", long_about = None)]
pub struct Cli {
    /// Config file path (defaults to ~/.notion-sync/config.toml)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single reconciliation pass now
    Sync,

    /// Watch the sync root and reconcile continuously until interrupted
    Watch,

    /// Show tracked items and the most recent pass reports
    Status {
        /// Number of past reports to show
        #[arg(short = 'n', long, default_value_t = 5)]
        history: usize,
    },

    /// Inspect or manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Reset the config file to defaults
    Reset,
    /// Copy the config file aside with a timestamp suffix
    Backup,
}

/// Default location of the config file
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".notion-sync")
        .join("config.toml")
}

fn load_config(path: &PathBuf) -> Result<SyncConfig> {
    let config = if path.exists() {
        SyncConfig::from_file(path)?
    } else {
        SyncConfig::from_env()?
    };
    Ok(config)
}

/// Run the CLI application
///
/// Parses arguments, initializes logging, loads configuration, and dispatches
/// to the selected command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match cli.command {
        Commands::Sync => {
            let config = load_config(&config_path)?;
            commands::execute_sync(&config).await?;
        }
        Commands::Watch => {
            let config = load_config(&config_path)?;
            commands::execute_watch(&config).await?;
        }
        Commands::Status { history } => {
            let config = load_config(&config_path)?;
            commands::execute_status(&config, history).await?;
        }
        Commands::Config { action } => {
            commands::execute_config(action, &config_path)?;
        }
    }

    Ok(())
}
