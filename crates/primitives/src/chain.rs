//! Chain identifiers as assigned by the guardian network.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric identifier of a chain in the guardian network's namespace.
///
/// Both origin and destination chains are identified this way so that a route can be expressed
/// in a single namespace regardless of the chain family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(u16);

impl ChainId {
    /// Ethereum mainnet.
    pub const ETHEREUM: ChainId = ChainId(2);
    /// Arbitrum One.
    pub const ARBITRUM: ChainId = ChainId(23);
    /// Optimism.
    pub const OPTIMISM: ChainId = ChainId(24);
    /// Base.
    pub const BASE: ChainId = ChainId(30);
    /// Aztec.
    pub const AZTEC: ChainId = ChainId(52);
    /// Ethereum Sepolia.
    pub const SEPOLIA: ChainId = ChainId(10002);
    /// Arbitrum Sepolia.
    pub const ARBITRUM_SEPOLIA: ChainId = ChainId(10003);
    /// Base Sepolia.
    pub const BASE_SEPOLIA: ChainId = ChainId(10004);
    /// Optimism Sepolia.
    pub const OPTIMISM_SEPOLIA: ChainId = ChainId(10005);

    /// Creates a new chain id from its raw value.
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw numeric value.
    pub const fn get(&self) -> u16 {
        self.0
    }

    /// Returns a human readable name for well-known chains.
    pub const fn name(&self) -> Option<&'static str> {
        match self.0 {
            2 => Some("ethereum"),
            23 => Some("arbitrum"),
            24 => Some("optimism"),
            30 => Some("base"),
            52 => Some("aztec"),
            10002 => Some("sepolia"),
            10003 => Some("arbitrum-sepolia"),
            10004 => Some("base-sepolia"),
            10005 => Some("optimism-sepolia"),
            _ => None,
        }
    }
}

impl From<u16> for ChainId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<ChainId> for u16 {
    fn from(value: ChainId) -> Self {
        value.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}({})", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}
