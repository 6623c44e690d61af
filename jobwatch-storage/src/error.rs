//! Error types for file-backed state

use thiserror::Error;

/// Errors from watch-list and path operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not determine a state directory (set JW_STATE_DIR)")]
    NoStateDir,
}

/// Errors from the daemon handle
#[derive(Debug, Error)]
pub enum HandleError {
    #[error("daemon already running{}", pid_suffix(.pid))]
    AlreadyRunning { pid: Option<u32> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn pid_suffix(pid: &Option<u32>) -> String {
    pid.map(|p| format!(" (PID: {})", p)).unwrap_or_default()
}
