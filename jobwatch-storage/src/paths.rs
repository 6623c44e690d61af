//! State directory layout

use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// Locations of every file the daemon and CLI share
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub dir: PathBuf,
    pub watchlist: PathBuf,
    pub pid: PathBuf,
    pub socket: PathBuf,
    pub log: PathBuf,
}

impl StatePaths {
    /// Layout rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            watchlist: dir.join("watchlist.json"),
            pid: dir.join("daemon.pid"),
            socket: dir.join("daemon.sock"),
            log: dir.join("daemon.log"),
            dir,
        }
    }

    /// Resolve from the environment
    ///
    /// `JW_STATE_DIR`, then `XDG_STATE_HOME/jobwatch`, then
    /// `~/.local/state/jobwatch`.
    pub fn resolve() -> Result<Self, StoreError> {
        Self::from_lookup(|key| std::env::var(key).ok(), dirs::home_dir())
    }

    pub fn from_lookup<F>(lookup: F, home: Option<PathBuf>) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(dir) = get("JW_STATE_DIR") {
            return Ok(Self::new(dir));
        }
        if let Some(xdg) = get("XDG_STATE_HOME") {
            return Ok(Self::new(Path::new(&xdg).join("jobwatch")));
        }
        let home = home.ok_or(StoreError::NoStateDir)?;
        Ok(Self::new(home.join(".local/state/jobwatch")))
    }
}
