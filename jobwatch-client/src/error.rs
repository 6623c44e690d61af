//! Error types for the jobwatch clients

use jobwatch_core::wire::ProtocolError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the jobwatch clients
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Remote returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error body from the remote
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// No credential is configured
    #[error(
        "Jenkins credentials not set. Set JENKINS_USER and JENKINS_API_TOKEN, or JENKINS_TOKEN"
    )]
    MissingCredentials,

    /// Could not reach the daemon's control socket
    #[error("daemon unavailable: {0}")]
    DaemonUnavailable(std::io::Error),

    /// Control protocol failure
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The daemon did not answer in time
    #[error("daemon did not respond in time")]
    Timeout,

    /// The daemon is exiting and refused the request
    #[error("daemon is shutting down")]
    ShuttingDown,

    /// The daemon answered with something other than what was asked for
    #[error("unexpected daemon response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code, if the remote answered with one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if the daemon simply is not listening
    pub fn is_not_running(&self) -> bool {
        matches!(self, Self::DaemonUnavailable(_))
    }

    /// Check if the daemon refused the request because it is exiting
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, Self::ShuttingDown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let not_found = ClientError::api_error(404, "gone");
        assert!(not_found.is_not_found());
        assert!(not_found.is_client_error());

        let unavailable = ClientError::api_error(503, "busy");
        assert!(!unavailable.is_client_error());
        assert_eq!(unavailable.status(), Some(503));

        assert_eq!(ClientError::Timeout.status(), None);
    }
}
