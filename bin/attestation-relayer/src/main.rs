//! Relays signed guardian attestations between an Aztec rollup and EVM chains.

use std::{fs, path::Path};

use anyhow::Context;
use clap::Parser;
use config::Config;
use constants::DEFAULT_THREAD_COUNT;
use relayer_common::logging::{self, LoggerConfig};
use serde::de::DeserializeOwned;
use tokio::runtime;
use tracing::{debug, info};

mod args;
mod bootstrap;
mod config;

mod constants;

/// The default glibc malloc fragments badly under the long-running allocation pattern of the
/// worker pool. [`Jemalloc`] keeps resident memory flat.
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn main() -> anyhow::Result<()> {
    let cli = args::Cli::parse();

    let mut config = parse_toml::<Config>(&cli.config)?;
    if let Some(datadir) = cli.datadir {
        config.datadir = datadir;
    }

    let runtime = runtime::Builder::new_multi_thread()
        .worker_threads(config.num_threads.unwrap_or(DEFAULT_THREAD_COUNT).max(1).into())
        .enable_all()
        .build()
        .context("failed to create runtime")?;

    // the otlp exporter needs a runtime context while it is being built
    let _guard = runtime.enter();
    let mut logger = LoggerConfig::with_base_name("attestation-relayer");
    logger.set_verbosity(config.logging.verbosity);
    if let Some(url) = logging::get_otlp_url_from_env().or_else(|| config.logging.otlp_url.clone())
    {
        logger.set_otlp_url(url);
    }
    logging::init(logger).context("failed to initialize logging")?;
    debug!(?config, "loaded configuration");

    runtime.block_on(bootstrap::bootstrap(config))?;

    info!("relayer shutdown complete");
    Ok(())
}

/// Reads and parses a TOML file from the given path into the given type `T`.
fn parse_toml<T>(path: impl AsRef<Path>) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    toml::from_str::<T>(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
