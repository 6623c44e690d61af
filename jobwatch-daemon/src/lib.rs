//! Jobwatch daemon
//!
//! A long-lived process that polls watched Jenkins jobs and notifies the user
//! when they finish.
//!
//! Architecture:
//! - Configuration: polling cadence and probe policy from the environment
//! - Prober: one HTTP status request per call, mapped to a probe result
//! - Notifier: desktop notifications, fire-and-forget
//! - Scheduler: per-job monitor tasks and the supervisor that owns them
//! - Control: Unix socket listener for reload, status and shutdown requests
//! - Lifecycle: startup, the main loop, and clean shutdown

pub mod config;
pub mod control;
pub mod lifecycle;
pub mod logging;
pub mod notify;
pub mod prober;
pub mod scheduler;

pub use config::Config;
pub use lifecycle::{Daemon, Deps, StartupError, startup};
