//! Jobwatch HTTP and control clients
//!
//! This crate provides the two clients shared by the daemon and the CLI:
//! - [`JenkinsClient`]: typed access to a Jenkins job's status endpoint
//! - [`ControlClient`]: requests to the running daemon over its control socket
//!
//! # Example
//!
//! ```no_run
//! use jobwatch_client::{Credentials, JenkinsClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = JenkinsClient::new(Credentials::from_env()?)?;
//!
//!     let status = client
//!         .get_job_status("https://ci.example.com/job/nightly/42")
//!         .await?;
//!
//!     println!("building: {}", status.building);
//!     Ok(())
//! }
//! ```

mod control;
mod credentials;
pub mod error;
mod jobs;

// Re-export commonly used types
pub use control::{ControlClient, DaemonStatus};
pub use credentials::Credentials;
pub use error::{ClientError, Result};
pub use jobs::BuildStatus;

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default bound on a single status request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for Jenkins job status endpoints
///
/// Unlike a base-URL API client, every call takes the full job URL: watched
/// jobs may live on different Jenkins hosts.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    /// Credential sent with each request
    credentials: Credentials,
    /// HTTP client instance
    client: Client,
}

impl JenkinsClient {
    /// Create a new client with the default request timeout
    ///
    /// # Arguments
    /// * `credentials` - Credential attached to each request
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::with_timeout(credentials, DEFAULT_TIMEOUT)
    }

    /// Create a new client with a custom request timeout
    pub fn with_timeout(credentials: Credentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(credentials, client))
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use jobwatch_client::{Credentials, JenkinsClient};
    /// use reqwest::Client;
    ///
    /// let client = JenkinsClient::with_client(
    ///     Credentials::Encoded("dXNlcjp0b2tlbg==".to_string()),
    ///     Client::new(),
    /// );
    /// ```
    pub fn with_client(credentials: Credentials, client: Client) -> Self {
        Self {
            credentials,
            client,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = JenkinsClient::new(Credentials::Encoded("abc".to_string()));
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_with_custom_client() {
        let client =
            JenkinsClient::with_client(Credentials::Encoded("abc".to_string()), Client::new());
        assert_eq!(client.credentials, Credentials::Encoded("abc".to_string()));
    }
}
