//! Errors reported by chain clients.

use relayer_primitives::{attestation::EmitterAddress, chain::ChainId};
use thiserror::Error;

/// Why a submission did not go through.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The failure may go away on its own; retrying the same path is reasonable.
    #[error("transient: {0}")]
    Transient(String),

    /// The service behind the primary path is down; the secondary path should be tried.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The destination rejected the submission. Retrying will not help.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl SubmitError {
    /// Short label used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            SubmitError::Transient(_) => "transient",
            SubmitError::ServiceUnavailable(_) => "service_unavailable",
            SubmitError::Permanent(_) => "permanent",
        }
    }
}

/// Errors raised while building clients from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientInitError {
    /// The signing key could not be parsed.
    #[error("invalid private key for chain {chain_id}: {reason}")]
    InvalidKey {
        /// Chain the key was configured for.
        chain_id: ChainId,
        /// Parser error, never the key itself.
        reason: String,
    },

    /// An endpoint URL could not be parsed.
    #[error("invalid url {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser error.
        reason: String,
    },

    /// An HTTP or RPC client could not be constructed.
    #[error("could not build transport: {0}")]
    Transport(String),

    /// More than one client was configured for the same chain.
    #[error("more than one client configured for chain {0}")]
    DuplicateChain(ChainId),

    /// A route points at a chain that has no client.
    #[error("route {origin_chain}/{emitter} targets chain {destination_chain} which has no client")]
    MissingClient {
        /// Origin chain of the route.
        origin_chain: ChainId,
        /// Emitter of the route.
        emitter: EmitterAddress,
        /// Destination chain without a client.
        destination_chain: ChainId,
    },
}
