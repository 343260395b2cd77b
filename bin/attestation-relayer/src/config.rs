use std::path::PathBuf;

use attestation_feed::config::FeedConfig;
use chain_clients::config::ChainClientConfig;
use relayer_common::logging::LogVerbosity;
use relayer_core::config::{ControllerConfig, RelayConfig};
use relayer_db::persistent::config::DbConfig;
use relayer_primitives::route::Route;
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_DATADIR;

/// Everything the relayer reads from its configuration file.
///
/// The route table and the chain clients are fixed for the lifetime of the process; changing them
/// requires a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Config {
    /// Number of runtime worker threads.
    pub num_threads: Option<u8>,

    /// The directory to store all the data in.
    #[serde(default = "default_datadir")]
    pub datadir: PathBuf,

    /// Connection to the attestation feed.
    pub feed: FeedConfig,

    /// Connection pool and lock handling of the sqlite3 database.
    #[serde(default)]
    pub db: DbConfig,

    /// Worker pool, queue and retention settings.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Submission budget and backoff.
    #[serde(default)]
    pub retry: ControllerConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// One client per destination chain.
    pub chains: Vec<ChainClientConfig>,

    /// Which emitters are relayed where.
    #[serde(default)]
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LoggingConfig {
    /// Default verbosity when `RUST_LOG` is unset.
    #[serde(default)]
    pub verbosity: LogVerbosity,

    /// OpenTelemetry collector endpoint. The `RELAYER_OTLP_URL` variable takes precedence.
    #[serde(default)]
    pub otlp_url: Option<String>,
}

fn default_datadir() -> PathBuf {
    PathBuf::from(DEFAULT_DATADIR)
}
