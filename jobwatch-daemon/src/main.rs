//! `jobwatchd`: the jobwatch background daemon
//!
//! Normally started by `jw add`. Exits on its own once the watch-list is empty.

use anyhow::{Context, Result};
use clap::Parser;
use jobwatch_client::Credentials;
use jobwatch_daemon::logging::{self, LogTarget};
use jobwatch_daemon::{Config, Deps, startup};
use jobwatch_storage::StatePaths;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "jobwatchd")]
#[command(about = "Jenkins job watch daemon", long_about = None)]
struct Args {
    /// Log to stderr instead of the state directory's daemon.log
    #[arg(long)]
    foreground: bool,

    /// State directory (watch-list, PID file, socket, log)
    #[arg(long, env = "JW_STATE_DIR")]
    state_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let paths = match args.state_dir {
        Some(dir) => StatePaths::new(dir),
        None => StatePaths::resolve().context("Failed to resolve state directory")?,
    };

    let target = if args.foreground {
        LogTarget::Stderr
    } else {
        LogTarget::File(&paths.log)
    };
    let _guard = logging::init(target)?;

    if let Err(e) = run(&paths).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(paths: &StatePaths) -> Result<()> {
    info!("Starting jobwatch daemon");

    let config = Config::from_env();
    config.validate()?;
    info!(
        "Poll interval: {:?}, retry interval: {:?}, self-check interval: {:?}",
        config.poll_interval, config.retry_interval, config.check_interval
    );

    let deps = Deps::production(&config, Credentials::from_env().ok())?;
    let daemon = startup(paths, &config, deps).await?;
    daemon.run().await;

    Ok(())
}
