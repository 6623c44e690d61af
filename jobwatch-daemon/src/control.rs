//! Control socket listener
//!
//! The listener runs in its own task, accepting connections on the daemon's
//! Unix socket and answering one framed request per connection. Reload and
//! status are served directly against the supervisor; a shutdown request is
//! acknowledged and then handed to the main loop. A reload that arrives once
//! the supervisor stopped taking work is refused, so the client knows the
//! change will not be picked up by this daemon.

use jobwatch_core::dto::control::{Request, Response};
use jobwatch_core::wire::{self, ProtocolError};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::scheduler::{Supervisor, SupervisorError};

/// Bound on reading a request from a connected client
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// State shared by every connection handler
pub struct ControlCtx {
    pub supervisor: Supervisor,
    pub pid: u32,
    pub start_time: Instant,
    /// Signalled when a client asks the daemon to stop
    pub shutdown: Arc<Notify>,
}

/// Accepts control connections
pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ControlCtx>,
}

impl Listener {
    /// Bind the control socket, replacing a leftover socket file
    pub fn bind(path: &Path, ctx: Arc<ControlCtx>) -> std::io::Result<Self> {
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed stale control socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let unix = UnixListener::bind(path)?;
        info!(path = %path.display(), "control socket listening");
        Ok(Self { unix, ctx })
    }

    /// Accept connections forever, one task per connection
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("control socket accept error: {}", e),
            }
        }
    }
}

async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &ControlCtx,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let bytes = match tokio::time::timeout(READ_TIMEOUT, wire::read_message(&mut reader)).await {
        Ok(result) => result?,
        Err(_) => {
            warn!("control client sent no request in time");
            return Ok(());
        }
    };

    let response = match wire::decode::<Request>(&bytes) {
        Ok(request) => {
            debug!(?request, "control request");
            handle_request(&request, ctx).await
        }
        Err(e) => Response::Error {
            message: format!("invalid request: {}", e),
        },
    };

    let payload = wire::encode(&response)?;
    wire::write_message(&mut writer, &payload).await?;
    Ok(())
}

/// Answer one request
pub async fn handle_request(request: &Request, ctx: &ControlCtx) -> Response {
    match request {
        Request::Ping => Response::Pong { pid: ctx.pid },
        Request::Reload => match ctx.supervisor.reconcile().await {
            Ok(_) => Response::Ok,
            Err(SupervisorError::ShuttingDown) => {
                debug!("reload refused, daemon shutting down");
                Response::ShuttingDown
            }
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },
        Request::Status => Response::Status {
            pid: ctx.pid,
            uptime_secs: ctx.start_time.elapsed().as_secs(),
            jobs: ctx.supervisor.jobs().await,
        },
        Request::Shutdown => {
            info!("shutdown requested over control socket");
            ctx.shutdown.notify_one();
            Response::Ok
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("control client disconnected"),
        other => warn!("control connection error: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::prober::StatusProber;
    use crate::scheduler::MonitorConfig;
    use async_trait::async_trait;
    use jobwatch_client::ControlClient;
    use jobwatch_core::domain::job::{JobId, ProbeResult, RunState};
    use jobwatch_storage::{FileWatchListStore, WatchListStore};

    struct AlwaysBuilding;

    #[async_trait]
    impl StatusProber for AlwaysBuilding {
        async fn probe(&self, _job: &JobId) -> ProbeResult {
            ProbeResult::Building
        }
    }

    fn context(dir: &Path) -> (Arc<ControlCtx>, Arc<FileWatchListStore>) {
        let store = Arc::new(FileWatchListStore::new(dir.join("watchlist.json")));
        let supervisor = Supervisor::new(
            store.clone(),
            Arc::new(AlwaysBuilding),
            Arc::new(RecordingNotifier::new()),
            MonitorConfig::default(),
        );
        let ctx = Arc::new(ControlCtx {
            supervisor,
            pid: 777,
            start_time: Instant::now(),
            shutdown: Arc::new(Notify::new()),
        });
        (ctx, store)
    }

    #[tokio::test]
    async fn test_reload_and_status_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("daemon.sock");
        let (ctx, store) = context(dir.path());

        let listener = Listener::bind(&socket, Arc::clone(&ctx)).unwrap();
        tokio::spawn(listener.run());

        let client = ControlClient::new(&socket);
        assert_eq!(client.ping().await.unwrap(), 777);

        store.add(&JobId::new("https://ci/job/a")).unwrap();
        client.reload().await.unwrap();

        let status = client.status().await.unwrap();
        assert_eq!(status.pid, 777);
        assert_eq!(status.jobs.len(), 1);
        assert_eq!(status.jobs[0].id, JobId::new("https://ci/job/a"));
        assert_eq!(status.jobs[0].state, RunState::Active);
        assert!(!status.jobs[0].last_check_failed);

        ctx.supervisor.shutdown_all().await;
    }

    #[tokio::test]
    async fn test_shutdown_request_signals_main_loop() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("daemon.sock");
        let (ctx, _store) = context(dir.path());

        let listener = Listener::bind(&socket, Arc::clone(&ctx)).unwrap();
        tokio::spawn(listener.run());

        let notified = ctx.shutdown.clone();
        let waiter = tokio::spawn(async move { notified.notified().await });

        ControlClient::new(&socket).shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("daemon.sock");
        std::fs::write(&socket, b"").unwrap();

        let (ctx, _store) = context(dir.path());
        assert!(Listener::bind(&socket, ctx).is_ok());
    }

    #[tokio::test]
    async fn test_garbage_request_gets_error_reply() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("daemon.sock");
        let (ctx, _store) = context(dir.path());
        tokio::spawn(Listener::bind(&socket, ctx).unwrap().run());

        let stream = tokio::net::UnixStream::connect(&socket).await.unwrap();
        let (mut reader, mut writer) = stream.into_split();
        wire::write_message(&mut writer, b"{\"type\":\"Launch\"}")
            .await
            .unwrap();
        let bytes = wire::read_message(&mut reader).await.unwrap();
        let reply: Response = wire::decode(&bytes).unwrap();
        assert!(matches!(reply, Response::Error { .. }));
    }

    #[tokio::test]
    async fn test_reload_after_shutdown_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, store) = context(dir.path());

        ctx.supervisor.shutdown_all().await;
        store.add(&JobId::new("https://ci/job/late")).unwrap();

        let reply = handle_request(&Request::Reload, &ctx).await;
        assert_eq!(reply, Response::ShuttingDown);
        assert!(ctx.supervisor.jobs().await.is_empty());
    }
}
