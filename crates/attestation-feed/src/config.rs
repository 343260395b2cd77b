//! Feed configuration.

use std::{fmt, time::Duration};

use relayer_retry::Backoff;
use serde::{Deserialize, Serialize};

/// Default subscription method exposed by the feed.
pub const DEFAULT_SUBSCRIBE_METHOD: &str = "subscribe_signedVaa";

/// Default unsubscription method exposed by the feed.
pub const DEFAULT_UNSUBSCRIBE_METHOD: &str = "unsubscribe_signedVaa";

/// Number of connection retries allowed at startup before giving up.
pub const DEFAULT_STARTUP_MAX_RETRIES: usize = 5;

/// Capacity of each subscription's buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Timeout for the WebSocket handshake.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Which guardian network to follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    /// Production guardians.
    Mainnet,

    /// Public testnet guardians.
    #[default]
    Testnet,

    /// A local development guardian.
    Devnet,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
        })
    }
}

/// Configuration of the feed connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// WebSocket JSON-RPC endpoint.
    pub ws_url: String,

    /// Network selector passed as the subscription parameter.
    #[serde(default)]
    pub network: Network,

    /// Subscription method.
    #[serde(default = "default_subscribe_method")]
    pub subscribe_method: String,

    /// Unsubscription method.
    #[serde(default = "default_unsubscribe_method")]
    pub unsubscribe_method: String,

    /// Connection retries at startup. Exhausting them is fatal.
    #[serde(default = "default_startup_max_retries")]
    pub startup_max_retries: usize,

    /// Backoff between connection attempts.
    #[serde(default)]
    pub reconnect: Backoff,

    /// Timeout for the WebSocket handshake.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: Duration,

    /// Capacity of each subscription's buffer.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl FeedConfig {
    /// A configuration with defaults for everything but the endpoint.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            network: Network::default(),
            subscribe_method: default_subscribe_method(),
            unsubscribe_method: default_unsubscribe_method(),
            startup_max_retries: DEFAULT_STARTUP_MAX_RETRIES,
            reconnect: Backoff::default(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

fn default_subscribe_method() -> String {
    DEFAULT_SUBSCRIBE_METHOD.to_string()
}

fn default_unsubscribe_method() -> String {
    DEFAULT_UNSUBSCRIBE_METHOD.to_string()
}

const fn default_startup_max_retries() -> usize {
    DEFAULT_STARTUP_MAX_RETRIES
}

const fn default_connection_timeout() -> Duration {
    DEFAULT_CONNECTION_TIMEOUT
}

const fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}
