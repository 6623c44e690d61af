//! Control socket client
//!
//! One request per connection: connect, write a framed request, read a
//! framed response.

use jobwatch_core::dto::control::{JobEntry, Request, Response};
use jobwatch_core::wire;
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::UnixStream;

use crate::error::{ClientError, Result};

/// Bound on a whole request/response exchange
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot reported by a running daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    pub pid: u32,
    pub uptime_secs: u64,
    pub jobs: Vec<JobEntry>,
}

/// Client for the daemon's control socket
#[derive(Debug, Clone)]
pub struct ControlClient {
    socket_path: PathBuf,
}

impl ControlClient {
    /// Create a client for the socket at `socket_path`
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Send a request and wait for the daemon's reply
    pub async fn send(&self, request: &Request) -> Result<Response> {
        tokio::time::timeout(EXCHANGE_TIMEOUT, self.exchange(request))
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    async fn exchange(&self, request: &Request) -> Result<Response> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(ClientError::DaemonUnavailable)?;
        let (mut reader, mut writer) = stream.into_split();

        let payload = wire::encode(request)?;
        wire::write_message(&mut writer, &payload).await?;

        let bytes = wire::read_message(&mut reader).await?;
        let response: Response = wire::decode(&bytes)?;

        match response {
            Response::ShuttingDown => Err(ClientError::ShuttingDown),
            Response::Error { message } => Err(ClientError::UnexpectedResponse(message)),
            other => Ok(other),
        }
    }

    /// Check that the daemon is answering; returns its process id
    pub async fn ping(&self) -> Result<u32> {
        match self.send(&Request::Ping).await? {
            Response::Pong { pid } => Ok(pid),
            other => Err(unexpected(&other)),
        }
    }

    /// Ask the daemon to re-read the watch-list
    ///
    /// Fails with [`ClientError::ShuttingDown`] when the daemon is already on
    /// its way out and will not pick up the change.
    pub async fn reload(&self) -> Result<()> {
        self.expect_ok(&Request::Reload).await
    }

    /// Ask the daemon to stop all tasks and exit
    pub async fn shutdown(&self) -> Result<()> {
        self.expect_ok(&Request::Shutdown).await
    }

    /// Fetch the daemon's view of its tasks
    pub async fn status(&self) -> Result<DaemonStatus> {
        match self.send(&Request::Status).await? {
            Response::Status {
                pid,
                uptime_secs,
                jobs,
            } => Ok(DaemonStatus {
                pid,
                uptime_secs,
                jobs,
            }),
            other => Err(unexpected(&other)),
        }
    }

    async fn expect_ok(&self, request: &Request) -> Result<()> {
        match self.send(request).await? {
            Response::Ok => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &Response) -> ClientError {
    ClientError::UnexpectedResponse(format!("{:?}", response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobwatch_core::domain::job::{JobId, RunState};
    use std::path::Path;
    use tokio::net::UnixListener;

    /// Serves canned replies for each request kind
    fn spawn_fake_daemon(path: &Path, reload: Response) {
        let listener = UnixListener::bind(path).unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let (mut reader, mut writer) = stream.into_split();
                let bytes = wire::read_message(&mut reader).await.unwrap();
                let request: Request = wire::decode(&bytes).unwrap();
                let response = match request {
                    Request::Ping => Response::Pong { pid: 4242 },
                    Request::Reload => reload.clone(),
                    Request::Status => Response::Status {
                        pid: 4242,
                        uptime_secs: 3,
                        jobs: vec![JobEntry {
                            id: JobId::new("https://ci/job/a"),
                            state: RunState::Active,
                            monitored_secs: 60,
                            last_check_failed: false,
                        }],
                    },
                    Request::Shutdown => Response::Error {
                        message: "already stopping".to_string(),
                    },
                };
                let payload = wire::encode(&response).unwrap();
                wire::write_message(&mut writer, &payload).await.unwrap();
            }
        });
    }

    #[tokio::test]
    async fn test_ping_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        spawn_fake_daemon(&path, Response::Ok);

        let client = ControlClient::new(&path);
        assert_eq!(client.ping().await.unwrap(), 4242);
        client.reload().await.unwrap();

        let status = client.status().await.unwrap();
        assert_eq!(status.pid, 4242);
        assert_eq!(status.jobs.len(), 1);
        assert_eq!(status.jobs[0].state, RunState::Active);
    }

    #[tokio::test]
    async fn test_error_reply_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        spawn_fake_daemon(&path, Response::Ok);

        let err = ControlClient::new(&path).shutdown().await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse(m) if m == "already stopping"));
    }

    #[tokio::test]
    async fn test_reload_refused_while_shutting_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        spawn_fake_daemon(&path, Response::ShuttingDown);

        let err = ControlClient::new(&path).reload().await.unwrap_err();
        assert!(err.is_shutting_down());
        assert!(!err.is_not_running());
    }

    #[tokio::test]
    async fn test_missing_socket_is_not_running() {
        let dir = tempfile::tempdir().unwrap();
        let err = ControlClient::new(dir.path().join("nope.sock"))
            .ping()
            .await
            .unwrap_err();
        assert!(err.is_not_running());
    }
}
