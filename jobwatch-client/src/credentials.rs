//! Jenkins credentials
//!
//! Resolved from the environment in priority order:
//! 1. `JENKINS_USER` + `JENKINS_API_TOKEN`, sent as HTTP basic auth
//! 2. `JENKINS_TOKEN`, an already base64-encoded `user:token` pair

use crate::error::{ClientError, Result};

/// Credential attached to every status request
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Username and API token
    Basic { user: String, token: String },
    /// Pre-encoded basic credential
    Encoded(String),
}

impl Credentials {
    /// Reads credentials from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads credentials through a lookup function
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let (Some(user), Some(token)) = (get("JENKINS_USER"), get("JENKINS_API_TOKEN")) {
            return Ok(Credentials::Basic { user, token });
        }

        if let Some(encoded) = get("JENKINS_TOKEN") {
            return Ok(Credentials::Encoded(encoded));
        }

        Err(ClientError::MissingCredentials)
    }

    /// Applies the credential to a request
    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credentials::Basic { user, token } => request.basic_auth(user, Some(token)),
            Credentials::Encoded(encoded) => {
                request.header(reqwest::header::AUTHORIZATION, format!("Basic {}", encoded))
            }
        }
    }
}

// Never print secrets
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .field("token", &"***")
                .finish(),
            Credentials::Encoded(_) => f.debug_tuple("Encoded").field(&"***").finish(),
        }
    }
}
