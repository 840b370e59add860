//! Command-line interface

use std::path::PathBuf;

use clap::Parser;

/// Package version plus the git commit the binary was built from.
const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CASITA_GIT_HASH"), ")");

/// Smart-home voice-assistant execution backend.
#[derive(Debug, Parser)]
#[command(name = "casita", version, long_version = LONG_VERSION, about)]
pub struct Cli {
    /// Path to the json5 configuration file.
    #[arg(short, long, default_value = "casita.json5")]
    pub config: PathBuf,

    /// Override the configured listen address.
    #[arg(long)]
    pub listen: Option<String>,

    /// Force the in-memory store regardless of configuration.
    #[arg(long)]
    pub memory: bool,
}
