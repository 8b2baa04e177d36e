//! Command-line args for the sync agent binary.

use std::path::PathBuf;

use clap::Parser;

/// Continuous directory synchronizer.
///
/// This binary is a thin smoke-testing harness around `sync_core`: it wires
/// the engine to a loopback channel that mirrors files into a second local
/// directory, standing in for the real remote agent until one is spoken to
/// over an actual transport.
#[derive(Parser)]
pub struct AgentArgs {
    /// Path to a TOML mapping configuration file.
    ///
    /// Mutually exclusive with `--local`/`--remote`.
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Local directory to mirror, for a single ad-hoc mapping.
    #[clap(short, long, requires = "remote")]
    pub local: Option<PathBuf>,

    /// Destination directory the loopback channel mirrors into.
    #[clap(short, long, requires = "local")]
    pub remote: Option<PathBuf>,

    /// Debounce window for coalescing filesystem event bursts.
    #[clap(long, default_value = "100ms")]
    pub debounce: humantime::Duration,
}
