//! Configuration of destination chain clients.

use std::{fmt, time::Duration};

use relayer_primitives::chain::ChainId;
use serde::{Deserialize, Serialize};

/// Default timeout for a single HTTP request to an auxiliary service or node.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A string that is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    /// Wraps a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret. Callers must not log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(<redacted>)")
    }
}

/// One `[[chains]]` entry, selected by its `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainClientConfig {
    /// An EVM chain reached over JSON-RPC.
    Evm(EvmClientConfig),

    /// An Aztec rollup.
    Aztec(AztecClientConfig),
}

impl ChainClientConfig {
    /// The chain the configured client submits to.
    pub const fn chain_id(&self) -> ChainId {
        match self {
            ChainClientConfig::Evm(cfg) => cfg.chain_id,
            ChainClientConfig::Aztec(cfg) => cfg.chain_id,
        }
    }
}

/// Settings for [`crate::evm::EvmClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmClientConfig {
    /// Chain id in the guardian network's namespace.
    pub chain_id: ChainId,

    /// HTTP JSON-RPC endpoint of the chain.
    pub rpc_url: String,

    /// Hex-encoded secp256k1 key of the submitting account.
    pub private_key: SecretString,

    /// Fixed gas limit for verification calls. Estimated by the node when unset.
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

/// Settings for [`crate::aztec::AztecClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AztecClientConfig {
    /// Chain id in the guardian network's namespace.
    pub chain_id: ChainId,

    /// Base URL of the verification service used as the primary path.
    pub service_url: String,

    /// JSON-RPC endpoint of an Aztec node, used as the secondary path.
    #[serde(default)]
    pub node_url: Option<String>,

    /// Timeout applied to each HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

const fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}
