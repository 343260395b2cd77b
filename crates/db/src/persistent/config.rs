//! Settings of the SQLite-backed ledger.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_BUSY_RETRIES, DEFAULT_BUSY_RETRY_DELAY, DEFAULT_BUSY_TIMEOUT, DEFAULT_MAX_CONNECTIONS,
};

/// Pool sizing and lock contention handling. Every field may be omitted from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Connections kept in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Passed to sqlite as `busy_timeout`.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout: Duration,

    /// Statement-level retries once sqlite gives up with a busy error.
    #[serde(default = "default_busy_retries")]
    pub busy_retries: usize,

    /// Pause between statement-level retries.
    #[serde(default = "default_busy_retry_delay")]
    pub busy_retry_delay: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            busy_retries: DEFAULT_BUSY_RETRIES,
            busy_retry_delay: DEFAULT_BUSY_RETRY_DELAY,
        }
    }
}

const fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

const fn default_busy_timeout() -> Duration {
    DEFAULT_BUSY_TIMEOUT
}

const fn default_busy_retries() -> usize {
    DEFAULT_BUSY_RETRIES
}

const fn default_busy_retry_delay() -> Duration {
    DEFAULT_BUSY_RETRY_DELAY
}
