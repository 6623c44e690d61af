//! Daemon process management
//!
//! Finds the `jobwatchd` binary, starts it detached from the terminal, and
//! waits for it to answer on its control socket.

use anyhow::{Context, Result, bail};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::config::Config;

const DAEMON_BINARY: &str = "jobwatchd";

/// How long to wait for a freshly spawned daemon to answer
const START_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a stopping daemon to release its PID file
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_STEP: Duration = Duration::from_millis(100);

/// The daemon binary installed next to `jw`, else whatever is on PATH
fn daemon_binary() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DAEMON_BINARY)))
        .filter(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from(DAEMON_BINARY))
}

/// Start a detached daemon and return its pid once it answers
pub async fn start(config: &Config) -> Result<u32> {
    let binary = daemon_binary();

    let child = Command::new(&binary)
        .arg("--state-dir")
        .arg(&config.paths.dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .with_context(|| format!("Failed to start {}", binary.display()))?;
    let spawned = child.id();
    // The daemon outlives us; nobody reaps it from here.
    drop(child);

    let control = config.control();
    let deadline = tokio::time::Instant::now() + START_TIMEOUT;
    loop {
        if let Ok(pid) = control.ping().await {
            return Ok(pid);
        }
        if tokio::time::Instant::now() >= deadline {
            bail!(
                "daemon (PID {}) did not come up; see {}",
                spawned,
                config.paths.log.display()
            );
        }
        tokio::time::sleep(POLL_STEP).await;
    }
}

/// Wait until no live daemon is recorded
///
/// Returns `false` if one is still recorded after `timeout`.
pub async fn wait_for_exit(config: &Config, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if config.daemon_pid().is_none() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_STEP).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobwatch_storage::{DaemonHandle, StatePaths};

    #[tokio::test]
    async fn test_wait_for_exit_without_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            paths: StatePaths::new(dir.path()),
        };
        assert!(wait_for_exit(&config, Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_wait_for_exit_times_out_on_held_handle() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            paths: StatePaths::new(dir.path()),
        };
        let _handle = DaemonHandle::acquire(&config.paths.pid).unwrap();
        assert!(!wait_for_exit(&config, Duration::from_millis(150)).await);
    }

    #[test]
    fn test_daemon_binary_has_expected_name() {
        assert!(daemon_binary().ends_with(DAEMON_BINARY));
    }
}
