//! Daemon startup, main loop and shutdown

use jobwatch_client::{Credentials, JenkinsClient};
use jobwatch_storage::{DaemonHandle, FileWatchListStore, HandleError, StatePaths};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::control::{ControlCtx, Listener};
use crate::notify::{DesktopNotifier, Notifier};
use crate::prober::{HttpStatusProber, StatusProber};
use crate::scheduler::{Supervisor, SupervisorError};

/// Reasons the daemon refuses to start
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(
        "Jenkins credentials missing: set JENKINS_USER and JENKINS_API_TOKEN, or JENKINS_TOKEN"
    )]
    MissingCredentials,

    #[error("initial reconciliation failed: {0}")]
    Reconcile(#[from] SupervisorError),

    #[error("daemon already running{}", pid_suffix(.pid))]
    AlreadyRunning { pid: Option<u32> },

    #[error("state directory unusable: {0}")]
    StateDir(#[source] std::io::Error),

    #[error("failed to bind control socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] jobwatch_client::ClientError),
}

fn pid_suffix(pid: &Option<u32>) -> String {
    pid.map(|p| format!(" (PID: {})", p)).unwrap_or_default()
}

impl From<HandleError> for StartupError {
    fn from(e: HandleError) -> Self {
        match e {
            HandleError::AlreadyRunning { pid } => StartupError::AlreadyRunning { pid },
            HandleError::Io(e) => StartupError::StateDir(e),
        }
    }
}

/// Collaborators injected into the supervisor
pub struct Deps {
    pub prober: Arc<dyn StatusProber>,
    pub notifier: Arc<dyn Notifier>,
}

impl Deps {
    /// Jenkins prober and desktop notifications
    ///
    /// `credentials` is `None` when none were found in the environment.
    pub fn production(
        config: &Config,
        credentials: Option<Credentials>,
    ) -> Result<Self, StartupError> {
        let credentials = credentials.ok_or(StartupError::MissingCredentials)?;
        let client = JenkinsClient::with_timeout(credentials, config.probe_timeout)?;
        let prober = HttpStatusProber::new(client)
            .with_client_errors_terminal(config.client_errors_are_terminal);

        Ok(Self {
            prober: Arc::new(prober),
            notifier: Arc::new(DesktopNotifier::new()),
        })
    }
}

/// A started daemon
pub struct Daemon {
    paths: StatePaths,
    config: Config,
    handle: DaemonHandle,
    supervisor: Supervisor,
    shutdown: Arc<Notify>,
    listener: JoinHandle<()>,
    sigterm: Signal,
    sigint: Signal,
}

/// Claim the daemon handle, open the control socket and start monitoring
///
/// Nothing is cleaned up when the handle is held by another daemon; those
/// files belong to it.
pub async fn startup(
    paths: &StatePaths,
    config: &Config,
    deps: Deps,
) -> Result<Daemon, StartupError> {
    std::fs::create_dir_all(&paths.dir).map_err(StartupError::StateDir)?;

    let handle = DaemonHandle::acquire(&paths.pid)?;

    match startup_inner(paths, config, deps, handle).await {
        Ok(daemon) => Ok(daemon),
        Err((e, handle)) => {
            cleanup_on_failure(paths, handle);
            Err(e)
        }
    }
}

async fn startup_inner(
    paths: &StatePaths,
    config: &Config,
    deps: Deps,
    handle: DaemonHandle,
) -> Result<Daemon, (StartupError, DaemonHandle)> {
    let store = Arc::new(FileWatchListStore::new(&paths.watchlist));
    let supervisor = Supervisor::new(store, deps.prober, deps.notifier, config.monitor());

    let sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => return Err((StartupError::Signals(e), handle)),
    };
    let sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => return Err((StartupError::Signals(e), handle)),
    };

    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(ControlCtx {
        supervisor: supervisor.clone(),
        pid: handle.pid(),
        start_time: Instant::now(),
        shutdown: Arc::clone(&shutdown),
    });
    let listener = match Listener::bind(&paths.socket, ctx) {
        Ok(listener) => tokio::spawn(listener.run()),
        Err(e) => return Err((StartupError::Socket(e), handle)),
    };

    let report = match supervisor.reconcile().await {
        Ok(report) => report,
        Err(e) => {
            listener.abort();
            return Err((e.into(), handle));
        }
    };
    info!(
        pid = handle.pid(),
        jobs = report.watched,
        state_dir = %paths.dir.display(),
        "daemon started"
    );

    Ok(Daemon {
        paths: paths.clone(),
        config: config.clone(),
        handle,
        supervisor,
        shutdown,
        listener,
        sigterm,
        sigint,
    })
}

fn cleanup_on_failure(paths: &StatePaths, handle: DaemonHandle) {
    if let Err(e) = std::fs::remove_file(&paths.socket) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %e, "failed to remove control socket");
        }
    }
    handle.release();
}

impl Daemon {
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn pid(&self) -> u32 {
        self.handle.pid()
    }

    /// Run until a shutdown request, a termination signal, or an empty
    /// watch-list, then shut down
    pub async fn run(mut self) {
        let period = self.config.check_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                _ = self.shutdown.notified() => break "shutdown requested",
                _ = self.sigterm.recv() => break "received SIGTERM",
                _ = self.sigint.recv() => break "received SIGINT",
                _ = ticker.tick() => {}
            }
            if let Some(reason) = self.self_check().await {
                break reason;
            }
        };

        info!(reason, "daemon stopping");
        self.shutdown().await;
    }

    /// Periodic check; returns a reason when the daemon should stop
    ///
    /// An empty watch-list closes the supervisor before the daemon stops, so
    /// a reload racing with the exit is refused instead of lost.
    async fn self_check(&mut self) -> Option<&'static str> {
        match self.handle.ensure_recorded() {
            Ok(_) => {}
            Err(HandleError::AlreadyRunning { pid }) => {
                error!(?pid, "PID file claimed by another daemon");
                return Some("lost daemon handle");
            }
            Err(e) => warn!(error = %e, "failed to verify PID file"),
        }

        let report = match self.supervisor.reconcile().await {
            Ok(report) => report,
            Err(SupervisorError::ShuttingDown) => return Some("supervisor closed"),
            Err(e) => {
                warn!(error = %e, "self-check reconcile failed");
                return None;
            }
        };
        if report.watched == 0 {
            match self.supervisor.close_if_idle().await {
                Ok(true) => return Some("watch-list is empty"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "failed to check for an idle supervisor"),
            }
        }
        debug!(jobs = report.watched, "self-check complete");
        None
    }

    /// Stop all tasks and remove the socket and PID file
    pub async fn shutdown(self) {
        self.supervisor.shutdown_all().await;
        self.listener.abort();

        if let Err(e) = std::fs::remove_file(&self.paths.socket) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to remove control socket");
            }
        }
        self.handle.release();
        info!("daemon stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::scheduler::MonitorConfig;
    use async_trait::async_trait;
    use jobwatch_client::ControlClient;
    use jobwatch_core::domain::job::{JobId, ProbeResult};
    use jobwatch_storage::WatchListStore;
    use std::time::Duration;

    struct AlwaysBuilding;

    #[async_trait]
    impl StatusProber for AlwaysBuilding {
        async fn probe(&self, _job: &JobId) -> ProbeResult {
            ProbeResult::Building
        }
    }

    fn deps() -> Deps {
        Deps {
            prober: Arc::new(AlwaysBuilding),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    fn fast_config() -> Config {
        Config {
            poll_interval: Duration::from_millis(20),
            retry_interval: Duration::from_millis(20),
            check_interval: Duration::from_millis(50),
            shutdown_timeout: Duration::from_millis(200),
            ..Config::default()
        }
    }

    fn seeded_paths(dir: &std::path::Path, jobs: &[&str]) -> StatePaths {
        let paths = StatePaths::new(dir);
        let store = FileWatchListStore::new(&paths.watchlist);
        for job in jobs {
            store.add(&JobId::new(*job)).unwrap();
        }
        paths
    }

    #[test]
    fn test_missing_credentials_refuses() {
        let err = Deps::production(&Config::default(), None).err().unwrap();
        assert!(matches!(err, StartupError::MissingCredentials));
    }

    #[test]
    fn test_production_deps_with_credentials() {
        let creds = Credentials::Encoded("dXNlcjp0b2tlbg==".to_string());
        assert!(Deps::production(&Config::default(), Some(creds)).is_ok());
    }

    #[tokio::test]
    async fn test_startup_starts_listed_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path(), &["https://ci/job/a", "https://ci/job/b"]);

        let daemon = startup(&paths, &fast_config(), deps()).await.unwrap();
        assert_eq!(daemon.supervisor().jobs().await.len(), 2);
        assert!(paths.socket.exists());
        assert_eq!(DaemonHandle::running_pid(&paths.pid), Some(daemon.pid()));

        daemon.shutdown().await;
        assert!(!paths.pid.exists());
        assert!(!paths.socket.exists());
    }

    #[tokio::test]
    async fn test_second_start_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path(), &["https://ci/job/a"]);

        let first = startup(&paths, &fast_config(), deps()).await.unwrap();
        let before = std::fs::read(&paths.pid).unwrap();

        let err = startup(&paths, &fast_config(), deps()).await.err().unwrap();
        assert!(matches!(err, StartupError::AlreadyRunning { pid: Some(p) } if p == first.pid()));
        assert_eq!(std::fs::read(&paths.pid).unwrap(), before);
        assert!(paths.socket.exists());

        first.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_over_control_socket() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(
            dir.path(),
            &["https://ci/job/a", "https://ci/job/b", "https://ci/job/c"],
        );

        let daemon = startup(&paths, &fast_config(), deps()).await.unwrap();
        let running = tokio::spawn(daemon.run());

        ControlClient::new(&paths.socket).shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(3), running)
            .await
            .unwrap()
            .unwrap();

        assert!(!paths.pid.exists());
        assert!(!paths.socket.exists());
        // Shutdown does not forget watched jobs
        assert_eq!(FileWatchListStore::new(&paths.watchlist).load().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_watch_list_stops_daemon() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path(), &["https://ci/job/a"]);

        let daemon = startup(&paths, &fast_config(), deps()).await.unwrap();
        let running = tokio::spawn(daemon.run());

        FileWatchListStore::new(&paths.watchlist)
            .remove(&JobId::new("https://ci/job/a"))
            .unwrap();

        tokio::time::timeout(Duration::from_secs(3), running)
            .await
            .unwrap()
            .unwrap();
        assert!(!paths.pid.exists());
    }

    #[tokio::test]
    async fn test_reload_during_idle_exit_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path(), &["https://ci/job/a"]);

        let mut daemon = startup(&paths, &fast_config(), deps()).await.unwrap();
        let store = FileWatchListStore::new(&paths.watchlist);
        store.remove(&JobId::new("https://ci/job/a")).unwrap();

        assert_eq!(daemon.self_check().await, Some("watch-list is empty"));

        // A job added while the daemon is on its way out is not acknowledged
        store.add(&JobId::new("https://ci/job/b")).unwrap();
        let err = ControlClient::new(&paths.socket).reload().await.unwrap_err();
        assert!(err.is_shutting_down());

        daemon.shutdown().await;
        assert_eq!(store.load().len(), 1);
    }

    #[tokio::test]
    async fn test_self_check_restores_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seeded_paths(dir.path(), &["https://ci/job/a"]);

        let mut daemon = startup(&paths, &fast_config(), deps()).await.unwrap();
        std::fs::remove_file(&paths.pid).unwrap();

        assert_eq!(daemon.self_check().await, None);
        assert_eq!(DaemonHandle::running_pid(&paths.pid), Some(daemon.pid()));

        daemon.shutdown().await;
    }

    #[test]
    fn test_monitor_config_follows_daemon_config() {
        let config = fast_config();
        assert_eq!(
            config.monitor(),
            MonitorConfig {
                poll_interval: Duration::from_millis(20),
                retry_interval: Duration::from_millis(20),
                shutdown_timeout: Duration::from_millis(200),
            }
        );
    }
}
