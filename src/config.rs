use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, WaitError};

/// Main configuration for a wait run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the uWSGI stats socket
    #[serde(default)]
    pub socket: PathBuf,
    /// Seconds to keep polling before giving up
    #[serde(default = "default_timeout_secs", rename = "timeout")]
    pub timeout_secs: u64,
    /// Delay between two polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket: PathBuf::new(),
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WaitError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content).map_err(|e| WaitError::Config(e.to_string()))
    }

    /// Merge CLI arguments into this configuration
    /// CLI arguments take precedence over config file values
    pub fn merge_cli_args(
        &mut self,
        socket: Option<PathBuf>,
        timeout_secs: Option<u64>,
        poll_interval_ms: Option<u64>,
    ) {
        if let Some(s) = socket {
            self.socket = s;
        }
        if let Some(t) = timeout_secs {
            self.timeout_secs = t;
        }
        if let Some(i) = poll_interval_ms {
            self.poll_interval_ms = i;
        }
    }

    /// Reject settings the poll loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.socket.as_os_str().is_empty() {
            return Err(WaitError::Config("no stats socket given".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(WaitError::Config(
                "poll interval must be at least 1 ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
