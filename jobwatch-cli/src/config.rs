//! Configuration module
//!
//! Handles CLI configuration: where the shared state lives and how to reach
//! the daemon.

use jobwatch_client::ControlClient;
use jobwatch_storage::{DaemonHandle, FileWatchListStore, StatePaths};

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// State directory layout shared with the daemon
    pub paths: StatePaths,
}

impl Config {
    pub fn store(&self) -> FileWatchListStore {
        FileWatchListStore::new(&self.paths.watchlist)
    }

    pub fn control(&self) -> ControlClient {
        ControlClient::new(&self.paths.socket)
    }

    /// Pid of the live daemon, clearing a stale PID file on the way
    pub fn daemon_pid(&self) -> Option<u32> {
        DaemonHandle::running_pid(&self.paths.pid)
    }
}
