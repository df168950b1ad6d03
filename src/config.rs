//! Session configuration.
//!
//! Timeouts and the correlation strategy, loadable from a JSON file. Every
//! field is optional in the file; missing fields take their defaults.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{CorsairError, Result};

// =============================================================================
// Defaults
// =============================================================================

/// How long to wait for a matching reply.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Sleep between reads of the polling strategy.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Sleep between idle reads of the event listener.
pub const DEFAULT_LISTENER_INTERVAL_MS: u64 = 10;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_listener_interval_ms() -> u64 {
    DEFAULT_LISTENER_INTERVAL_MS
}

// =============================================================================
// Strategy
// =============================================================================

/// How replies are waited for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Caller polls the channel.
    #[default]
    Poll,
    /// Background listener completes exchanges.
    Event,
}

impl FromStr for Strategy {
    type Err = CorsairError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "poll" | "polling" => Ok(Strategy::Poll),
            "event" | "events" => Ok(Strategy::Event),
            other => Err(CorsairError::InvalidArgument(format!(
                "Unknown strategy '{}'. Use: poll, event",
                other
            ))),
        }
    }
}

// =============================================================================
// SessionConfig
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_listener_interval_ms")]
    pub listener_interval_ms: u64,

    #[serde(default)]
    pub strategy: Strategy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            listener_interval_ms: DEFAULT_LISTENER_INTERVAL_MS,
            strategy: Strategy::Poll,
        }
    }
}

impl SessionConfig {
    /// Load a configuration file.
    ///
    /// # Errors
    /// Returns `Config` if the file cannot be read or parsed, or holds a zero timeout.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CorsairError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: SessionConfig = serde_json::from_str(&content).map_err(|e| {
            CorsairError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(CorsairError::Config("timeout_ms must be nonzero".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn listener_interval(&self) -> Duration {
        Duration::from_millis(self.listener_interval_ms)
    }
}
