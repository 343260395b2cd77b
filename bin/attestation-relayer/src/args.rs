//! Parses command-line arguments for the relayer.

use std::path::PathBuf;

use clap::{crate_version, Parser};

#[derive(Debug, Parser)]
#[clap(
    name = "attestation-relayer",
    about = "Relays guardian attestations between chains",
    version = crate_version!()
)]
pub(crate) struct Cli {
    #[clap(
        long,
        short = 'c',
        help = "The file containing the configuration for the relayer",
        default_value = "config.toml"
    )]
    pub config: PathBuf,

    #[clap(
        long,
        short = 'd',
        help = "Overrides the data directory set in the configuration file",
        env = "RELAYER_DATADIR"
    )]
    pub datadir: Option<PathBuf>,
}
