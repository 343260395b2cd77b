//! Feed errors.

use thiserror::Error;

/// Errors raised by the feed client.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// The WebSocket connection could not be established.
    #[error("could not connect to {url}: {reason}")]
    Connect {
        /// Endpoint that was dialed.
        url: String,
        /// Underlying error.
        reason: String,
    },

    /// The connection was established but the subscription was refused.
    #[error("subscription {method} failed: {reason}")]
    Subscribe {
        /// Subscription method that was called.
        method: String,
        /// Underlying error.
        reason: String,
    },

    /// The feed was closed while connecting.
    #[error("feed closed")]
    Closed,
}
