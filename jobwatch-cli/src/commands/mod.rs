//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod add;
mod logs;
mod remove;
mod status;
mod stop;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start watching a job (starts the daemon if needed)
    Add {
        /// Job URL, e.g. https://ci.example.com/job/nightly/42/
        job: String,
    },
    /// Stop watching a job
    Remove {
        /// Job URL as given to `add`
        job: String,
    },
    /// Stop the daemon (watched jobs are kept)
    Stop,
    /// Show the daemon and the watched jobs
    Status,
    /// Show the daemon log
    Logs {
        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
        /// Keep printing new lines as they are written
        #[arg(short, long)]
        follow: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
///
/// # Returns
/// Result indicating success or failure
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Add { job } => add::add_job(&job, config).await,
        Commands::Remove { job } => remove::remove_job(&job, config).await,
        Commands::Stop => stop::stop_daemon(config).await,
        Commands::Status => status::show_status(config).await,
        Commands::Logs { lines, follow } => logs::show_logs(config, lines, follow).await,
    }
}

/// Ask a live daemon to re-read the watch-list
///
/// Returns `false` when no daemon is running or it is already exiting.
async fn notify_daemon(config: &Config) -> Result<bool> {
    if config.daemon_pid().is_none() {
        return Ok(false);
    }
    match config.control().reload().await {
        Ok(()) => Ok(true),
        Err(e) if e.is_shutting_down() => Ok(false),
        Err(e) => Err(e.into()),
    }
}
