//! Retry strategies shared by the relayer's network-facing components.
//!
//! A [`Strategy`] classifies each error into a [`RetryAction`] and optionally caps the number of
//! retries. [`retry_with`] drives a future generator under a strategy. The generator receives the
//! zero-based attempt number so that callers can tag logs or vary behavior per attempt.

use std::{future::Future, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

/// Type alias for the error handler function to reduce type complexity.
pub type ErrorHandler<E> = Arc<dyn Fn(&E, usize) -> RetryAction + Send + Sync>;

/// Represents the action to take when an error occurs during retry attempts.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RetryAction {
    /// Continue retrying after the specified delay.
    Retry(Duration),

    /// Stop retrying and return the error.
    Stop,
}

/// Exponential backoff parameters.
///
/// The delay before retry `n` (zero-based) is `initial_delay * multiplier^n`, capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound on any single delay.
    pub max_delay: Duration,

    /// Growth factor applied per retry.
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// Delay to wait before the given zero-based retry.
    pub fn delay(&self, attempt: usize) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exp);
        let capped = millis.min(self.max_delay.as_millis() as f64);

        // NaN and negative values collapse to zero
        Duration::from_millis(capped.max(0.0) as u64)
    }
}

/// A retry strategy that determines how to handle errors and when to retry.
#[derive(Clone)]
pub struct Strategy<E> {
    /// Determines the action to take for a given error and retry attempt number.
    error_handler: ErrorHandler<E>,

    /// Maximum number of retry attempts (None for unlimited).
    max_retries: Option<usize>,
}

impl<E> std::fmt::Debug for Strategy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy")
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl<E> Strategy<E> {
    /// Creates a new retry strategy with the given error handler.
    ///
    /// This will retry indefinitely unless a maximum number of retries is set later with
    /// [`Self::with_max_retries`].
    pub fn new<F>(error_handler: F) -> Self
    where
        F: Fn(&E, usize) -> RetryAction + Send + Sync + 'static,
    {
        Self {
            error_handler: Arc::new(error_handler),
            max_retries: None,
        }
    }

    /// Sets the maximum number of retry attempts.
    ///
    /// The generator is invoked at most `max_retries + 1` times.
    pub const fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Drives `generator` under `strategy` until it succeeds, the strategy says stop, or the retry
/// budget runs out. The last error is returned in the latter two cases.
///
/// `generator` is called with the zero-based attempt number.
pub async fn retry_with<A, E, Fut, Gen>(strategy: Strategy<E>, mut generator: Gen) -> Result<A, E>
where
    Fut: Future<Output = Result<A, E>>,
    Gen: FnMut(usize) -> Fut,
{
    let mut attempt = 0;

    loop {
        match generator(attempt).await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if let Some(max_retries) = strategy.max_retries {
                    if attempt >= max_retries {
                        return Err(error);
                    }
                }

                match (strategy.error_handler)(&error, attempt) {
                    RetryAction::Retry(delay) => {
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        attempt += 1;
                    }
                    RetryAction::Stop => return Err(error),
                }
            }
        }
    }
}
