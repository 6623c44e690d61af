//! Control DTOs
//!
//! Requests sent by the CLI to the running daemon and the daemon's replies.

use serde::{Deserialize, Serialize};

use crate::domain::job::{JobId, RunState};

/// Request to the running daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Liveness check
    Ping,
    /// Re-read the watch-list and reconcile running tasks
    Reload,
    /// Report the tasks the supervisor is tracking
    Status,
    /// Stop every task and exit
    Shutdown,
}

/// Reply from the running daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pong {
        pid: u32,
    },
    Ok,
    Status {
        pid: u32,
        uptime_secs: u64,
        jobs: Vec<JobEntry>,
    },
    /// The daemon is exiting and no longer accepts work
    ShuttingDown,
    Error {
        message: String,
    },
}

/// A task tracked by the supervisor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEntry {
    pub id: JobId,
    pub state: RunState,
    /// Seconds since the current task started
    pub monitored_secs: u64,
    /// Whether the most recent probe failed
    pub last_check_failed: bool,
}
