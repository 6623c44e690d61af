//! `jw stop`

use anyhow::{Result, bail};
use colored::*;

use crate::config::Config;
use crate::daemon;

/// Ask the daemon to shut down and wait for it to go away
pub async fn stop_daemon(config: &Config) -> Result<()> {
    let Some(pid) = config.daemon_pid() else {
        println!("{}", "Daemon is not running.".yellow());
        return Ok(());
    };

    config.control().shutdown().await?;

    if daemon::wait_for_exit(config, daemon::STOP_TIMEOUT).await {
        println!("{}", format!("Daemon stopped (PID {})", pid).green());
        Ok(())
    } else {
        bail!("daemon (PID {}) is still running", pid)
    }
}
