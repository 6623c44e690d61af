//! Jobwatch CLI
//!
//! Command-line interface for managing watched Jenkins jobs and the
//! background daemon that polls them.

mod commands;
mod config;
mod daemon;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use jobwatch_storage::StatePaths;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "jw")]
#[command(about = "Watch Jenkins jobs and get notified when they finish", long_about = None)]
struct Cli {
    /// State directory shared with the daemon
    #[arg(long, env = "JW_STATE_DIR")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = match cli.state_dir {
        Some(dir) => StatePaths::new(dir),
        None => StatePaths::resolve()?,
    };
    let config = Config { paths };

    handle_command(cli.command, &config).await
}
