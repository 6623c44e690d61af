//! `jw add`

use anyhow::{Context, Result, bail};
use colored::*;
use jobwatch_client::Credentials;
use jobwatch_core::domain::job::JobId;
use jobwatch_storage::WatchListStore;

use crate::config::Config;
use crate::daemon;

/// Add a job to the watch-list and make sure a daemon is polling it
pub async fn add_job(job: &str, config: &Config) -> Result<()> {
    let job = parse_job_url(job)?;
    let running = config.daemon_pid().is_some();

    if !running {
        require_credentials()?;
    }

    let added = config
        .store()
        .add(&job)
        .context("Failed to update the watch-list")?;
    if added {
        println!("{} {}", "Watching".green(), job.as_str().bold());
    } else {
        println!("{} {}", "Already watching".yellow(), job.as_str().bold());
    }

    if running {
        if reload_running(config).await? {
            return Ok(());
        }
        require_credentials()?;
    }

    let pid = daemon::start(config).await?;
    println!("{}", format!("Daemon started (PID {})", pid).dimmed());
    Ok(())
}

/// A new daemon would refuse to start without credentials
fn require_credentials() -> Result<()> {
    if Credentials::from_env().is_err() {
        bail!(
            "missing Jenkins credentials: set JENKINS_USER and JENKINS_API_TOKEN, or JENKINS_TOKEN"
        );
    }
    Ok(())
}

/// Hand the updated watch-list to the running daemon
///
/// Returns `false` when that daemon is exiting and a new one has to be
/// started; the old one is given time to let go of its PID file first.
async fn reload_running(config: &Config) -> Result<bool> {
    match config.control().reload().await {
        Ok(()) => Ok(true),
        Err(e) if e.is_shutting_down() || e.is_not_running() => {
            println!("{}", "Daemon is shutting down, starting a new one".dimmed());
            if !daemon::wait_for_exit(config, daemon::STOP_TIMEOUT).await {
                bail!("the previous daemon did not exit; try again");
            }
            Ok(false)
        }
        Err(e) => Err(e).context("Failed to reload the daemon"),
    }
}

/// Job identifiers are the job's URL
fn parse_job_url(raw: &str) -> Result<JobId> {
    let trimmed = raw.trim();
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        bail!("job must be an http:// or https:// URL, got '{}'", raw);
    }
    Ok(JobId::new(trimmed))
}
