//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// replset - replica set membership reconciler
#[derive(Parser, Debug)]
#[command(name = "replset")]
#[command(version)]
#[command(about = "Converge a MongoDB replica set to its declared membership")]
#[command(
    long_about = "replset probes the declared members of a MongoDB replica set, initiates the \
                  set when it does not exist yet and reconfigures it through its primary when \
                  the membership drifts."
)]
pub struct Cli {
    /// Settings file (.yaml, .yml or .toml)
    #[arg(short, long, global = true, default_value = "replset.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Normalize the declared members without contacting any host
    Validate,

    /// Show the current replica set configuration
    Status,

    /// Show what a pass would do, without changing anything
    Plan,

    /// Run one reconciliation pass
    Apply,

    /// Run reconciliation passes until interrupted
    Watch {
        /// Seconds between passes
        #[arg(short, long, default_value_t = 30)]
        interval: u64,
    },
}
