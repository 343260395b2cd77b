//! The chain client interface.

use std::fmt;

use async_trait::async_trait;
use relayer_primitives::{chain::ChainId, outcome::TxId, route::DestinationContext};

use crate::errors::SubmitError;

/// Which of a client's submission paths to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionPath {
    /// The preferred path.
    Primary,

    /// The fallback used when the primary path's service is unavailable.
    Secondary,
}

impl fmt::Display for SubmissionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionPath::Primary => f.write_str("primary"),
            SubmissionPath::Secondary => f.write_str("secondary"),
        }
    }
}

/// Submits verification transactions to one destination chain.
#[async_trait]
pub trait ChainClient: fmt::Debug + Send + Sync {
    /// The chain this client submits to.
    fn chain_id(&self) -> ChainId;

    /// Whether [`SubmissionPath::Secondary`] is usable.
    fn has_secondary_path(&self) -> bool {
        false
    }

    /// Submits `payload` for verification by `target`.
    ///
    /// The payload is the raw attestation envelope and must be forwarded unmodified.
    async fn submit_verification(
        &self,
        target: &DestinationContext,
        payload: &[u8],
        path: SubmissionPath,
    ) -> Result<TxId, SubmitError>;
}
