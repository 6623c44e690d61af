//! `jw remove`

use anyhow::{Context, Result};
use colored::*;
use jobwatch_core::domain::job::JobId;
use jobwatch_storage::WatchListStore;

use super::notify_daemon;
use crate::config::Config;

/// Drop a job from the watch-list and tell the daemon
pub async fn remove_job(job: &str, config: &Config) -> Result<()> {
    let job = JobId::new(job.trim());

    let removed = config
        .store()
        .remove(&job)
        .context("Failed to update the watch-list")?;
    if !removed {
        println!("{} {}", "Not watching".yellow(), job.as_str().bold());
        return Ok(());
    }
    println!("{} {}", "Stopped watching".green(), job.as_str().bold());

    if notify_daemon(config).await? {
        println!("{}", "Daemon reloaded".dimmed());
    }
    Ok(())
}
