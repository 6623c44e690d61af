//! Jobwatch Storage
//!
//! File-backed state shared by the daemon and the CLI:
//! - Watch-list: the persisted set of monitored jobs
//! - Daemon handle: the PID record that makes the daemon a per-host singleton
//! - Paths: where those files live

pub mod error;
pub mod handle;
pub mod paths;
pub mod watchlist;

pub use error::{HandleError, StoreError};
pub use handle::DaemonHandle;
pub use paths::StatePaths;
pub use watchlist::{FileWatchListStore, WatchListStore};
