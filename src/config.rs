//! Configuration for the social data layer
//!
//! Every settle window the store is asked to wait, and every retry step of
//! the resolution engine, lives here instead of as a hidden constant.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Settle window of the first resolution pass (ms)
    #[serde(default = "default_initial_settle_ms")]
    pub initial_settle_ms: u64,

    /// Added to the settle window on every retry after the first (ms)
    #[serde(default = "default_retry_step_ms")]
    pub retry_step_ms: u64,

    /// Overall cap on a single resolution, across all retries (ms)
    #[serde(default = "default_resolve_deadline_ms")]
    pub resolve_deadline_ms: u64,

    /// Return the marker-free part of a post when the deadline elapses
    /// instead of failing with a timeout
    #[serde(default = "default_true")]
    pub accept_partial_on_timeout: bool,

    /// Settle window for lenient reads (ms)
    #[serde(default = "default_lenient_settle_ms")]
    pub lenient_settle_ms: u64,

    /// Settle window for protocol existence checks (ms)
    #[serde(default = "default_check_wait_ms")]
    pub check_wait_ms: u64,

    /// Settle window for loading the friend set before paging (ms)
    #[serde(default = "default_friends_wait_ms")]
    pub friends_wait_ms: u64,

    /// Settle window for loading post indices (ms)
    #[serde(default = "default_index_wait_ms")]
    pub index_wait_ms: u64,

    /// Capacity of the event bus channel
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_initial_settle_ms() -> u64 {
    400
}

fn default_retry_step_ms() -> u64 {
    100
}

fn default_resolve_deadline_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_lenient_settle_ms() -> u64 {
    300
}

fn default_check_wait_ms() -> u64 {
    1_000
}

fn default_friends_wait_ms() -> u64 {
    200
}

fn default_index_wait_ms() -> u64 {
    500
}

fn default_event_capacity() -> usize {
    256
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            initial_settle_ms: default_initial_settle_ms(),
            retry_step_ms: default_retry_step_ms(),
            resolve_deadline_ms: default_resolve_deadline_ms(),
            accept_partial_on_timeout: true,
            lenient_settle_ms: default_lenient_settle_ms(),
            check_wait_ms: default_check_wait_ms(),
            friends_wait_ms: default_friends_wait_ms(),
            index_wait_ms: default_index_wait_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl ClientConfig {
    /// Configuration for tests and local simulation (short windows)
    pub fn for_local() -> Self {
        Self {
            initial_settle_ms: 10,
            retry_step_ms: 5,
            resolve_deadline_ms: 500,
            lenient_settle_ms: 5,
            check_wait_ms: 5,
            friends_wait_ms: 5,
            index_wait_ms: 5,
            ..Default::default()
        }
    }

    /// Load config from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn retry_step(&self) -> Duration {
        Duration::from_millis(self.retry_step_ms)
    }

    pub fn resolve_deadline(&self) -> Duration {
        Duration::from_millis(self.resolve_deadline_ms)
    }

    pub fn lenient_settle(&self) -> Duration {
        Duration::from_millis(self.lenient_settle_ms)
    }

    pub fn check_wait(&self) -> Duration {
        Duration::from_millis(self.check_wait_ms)
    }

    pub fn friends_wait(&self) -> Duration {
        Duration::from_millis(self.friends_wait_ms)
    }

    pub fn index_wait(&self) -> Duration {
        Duration::from_millis(self.index_wait_ms)
    }
}
