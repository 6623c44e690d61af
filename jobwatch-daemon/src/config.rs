//! Daemon configuration
//!
//! Defines the polling cadence, timeouts and probe policy. Every value has a
//! default and can be overridden from the environment.

use std::time::Duration;

use crate::scheduler::MonitorConfig;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// How often to probe a job while it is building
    pub poll_interval: Duration,

    /// How long to wait after a failed probe
    pub retry_interval: Duration,

    /// Timeout for a single status request
    pub probe_timeout: Duration,

    /// How often the daemon re-reads the watch-list and checks its PID file
    pub check_interval: Duration,

    /// How long to wait for each task to exit on shutdown
    pub shutdown_timeout: Duration,

    /// Treat 4xx responses other than 404/429 as "job gone"
    pub client_errors_are_terminal: bool,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - JW_POLL_INTERVAL (seconds, default: 10)
    /// - JW_RETRY_INTERVAL (seconds, default: 30)
    /// - JW_PROBE_TIMEOUT (seconds, default: 15)
    /// - JW_CHECK_INTERVAL (seconds, default: 5)
    /// - JW_SHUTDOWN_TIMEOUT_MS (milliseconds, default: 2000)
    /// - JW_CLIENT_ERRORS_TERMINAL (1/true/yes to enable, default: off)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source
    ///
    /// Unparseable values fall back to the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let shutdown_timeout = lookup("JW_SHUTDOWN_TIMEOUT_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.shutdown_timeout);

        let client_errors_are_terminal = lookup("JW_CLIENT_ERRORS_TERMINAL")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.client_errors_are_terminal);

        Self {
            poll_interval: secs("JW_POLL_INTERVAL", defaults.poll_interval),
            retry_interval: secs("JW_RETRY_INTERVAL", defaults.retry_interval),
            probe_timeout: secs("JW_PROBE_TIMEOUT", defaults.probe_timeout),
            check_interval: secs("JW_CHECK_INTERVAL", defaults.check_interval),
            shutdown_timeout,
            client_errors_are_terminal,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.retry_interval.is_zero() {
            anyhow::bail!("retry_interval must be greater than 0");
        }

        if self.probe_timeout.is_zero() {
            anyhow::bail!("probe_timeout must be greater than 0");
        }

        if self.check_interval.is_zero() {
            anyhow::bail!("check_interval must be greater than 0");
        }

        Ok(())
    }

    /// Timing knobs for the per-job monitor tasks
    pub fn monitor(&self) -> MonitorConfig {
        MonitorConfig {
            poll_interval: self.poll_interval,
            retry_interval: self.retry_interval,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            retry_interval: Duration::from_secs(30),
            probe_timeout: jobwatch_client::DEFAULT_TIMEOUT,
            check_interval: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(2),
            client_errors_are_terminal: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.retry_interval, Duration::from_secs(30));
        assert_eq!(config.probe_timeout, Duration::from_secs(15));
        assert_eq!(config.check_interval, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
        assert!(!config.client_errors_are_terminal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = from_map(&[
            ("JW_POLL_INTERVAL", "3"),
            ("JW_RETRY_INTERVAL", "7"),
            ("JW_SHUTDOWN_TIMEOUT_MS", "250"),
            ("JW_CLIENT_ERRORS_TERMINAL", "true"),
        ]);
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.retry_interval, Duration::from_secs(7));
        assert_eq!(config.shutdown_timeout, Duration::from_millis(250));
        assert!(config.client_errors_are_terminal);
    }

    #[test]
    fn test_garbage_falls_back_to_default() {
        let config = from_map(&[("JW_POLL_INTERVAL", "soon"), ("JW_CLIENT_ERRORS_TERMINAL", "0")]);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert!(!config.client_errors_are_terminal);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.poll_interval = Duration::from_secs(1);
        config.check_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
