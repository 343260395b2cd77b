//! Configuration of the relay pipeline and the retry controller.

use std::time::Duration;

use relayer_retry::Backoff;
use serde::{Deserialize, Serialize};

/// Default number of workers draining the queue.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default capacity of the work queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default time workers get to finish their current item on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default submission budget per dispatch.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default deadline of a single submission.
pub const DEFAULT_SUBMISSION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default interval between pruning passes.
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// Sizing and lifecycle of the relay pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Number of workers. At least one worker is always started.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Capacity of the queue between intake and the workers.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How long workers may take to finish their current item once shutdown starts.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,

    /// Pruning of old terminal records. Disabled when absent.
    #[serde(default)]
    pub retention: Option<RetentionConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            retention: None,
        }
    }
}

/// How long terminal records are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Terminal records older than this are deleted.
    pub max_age: Duration,

    /// Time between pruning passes.
    #[serde(default = "default_prune_interval")]
    pub interval: Duration,
}

/// Budget and pacing of submissions for one attestation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Total submissions allowed per dispatch, across both paths. Zero is treated as one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff applied after transient failures.
    #[serde(default)]
    pub backoff: Backoff,

    /// Deadline of a single submission. Elapsing counts as a transient failure.
    #[serde(default = "default_submission_timeout")]
    pub submission_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::default(),
            submission_timeout: DEFAULT_SUBMISSION_TIMEOUT,
        }
    }
}

const fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

const fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

const fn default_shutdown_timeout() -> Duration {
    DEFAULT_SHUTDOWN_TIMEOUT
}

const fn default_prune_interval() -> Duration {
    DEFAULT_PRUNE_INTERVAL
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_submission_timeout() -> Duration {
    DEFAULT_SUBMISSION_TIMEOUT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tables_use_defaults() {
        let relay: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(relay, RelayConfig::default());

        let controller: ControllerConfig = toml::from_str("").unwrap();
        assert_eq!(controller, ControllerConfig::default());
    }

    #[test]
    fn parses_overrides() {
        let relay: RelayConfig = toml::from_str(
            r#"
            concurrency = 8
            queue_capacity = 16
            shutdown_timeout = { secs = 5, nanos = 0 }

            [retention]
            max_age = { secs = 604800, nanos = 0 }
            "#,
        )
        .unwrap();

        assert_eq!(relay.concurrency, 8);
        assert_eq!(relay.queue_capacity, 16);
        assert_eq!(relay.shutdown_timeout, Duration::from_secs(5));
        assert_eq!(
            relay.retention,
            Some(RetentionConfig {
                max_age: Duration::from_secs(604_800),
                interval: DEFAULT_PRUNE_INTERVAL,
            })
        );

        let controller: ControllerConfig = toml::from_str(
            r#"
            max_attempts = 3
            submission_timeout = { secs = 10, nanos = 0 }

            [backoff]
            initial_delay = { secs = 1, nanos = 0 }
            max_delay = { secs = 8, nanos = 0 }
            multiplier = 3.0
            "#,
        )
        .unwrap();

        assert_eq!(controller.max_attempts, 3);
        assert_eq!(controller.submission_timeout, Duration::from_secs(10));
        assert_eq!(controller.backoff.initial_delay, Duration::from_secs(1));
        assert_eq!(controller.backoff.multiplier, 3.0);
    }
}
