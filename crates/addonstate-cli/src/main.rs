use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

mod completion;
mod config;
mod dispatch;
mod fs_locations;
mod render;
mod services;

use completion::CliCompletionShell;
use dispatch::run_cli;

const LOG_ENV_VAR: &str = "ADDONSTATE_LOG";

#[derive(Parser, Debug)]
#[command(name = "addonstate")]
#[command(about = "Reconcile and inspect a profile's addon database", long_about = None)]
struct Cli {
    /// Profile directory holding the database and install locations.
    #[arg(long, default_value = ".")]
    profile: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the database with the install locations.
    Scan {
        /// The application version changed since the last run.
        #[arg(long)]
        app_changed: bool,
    },
    List {
        #[arg(long = "type")]
        addon_type: Option<String>,
        /// Include records hidden by a higher priority location.
        #[arg(long)]
        all: bool,
    },
    Info {
        id: String,
    },
    Enable {
        id: String,
    },
    Disable {
        id: String,
        #[arg(long)]
        allow_system: bool,
    },
    /// Switch the active theme. Without an id the default theme is selected.
    Theme {
        id: Option<String>,
    },
    Attention {
        #[arg(long)]
        dismiss: bool,
    },
    /// Re-check package signatures on disk.
    Verify,
    SetSyncId {
        id: String,
        guid: String,
    },
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    run_cli(Cli::parse()).await
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests;
