//! CLI argument definitions for zargo.
//!
//! Uses `clap` derive macros to define the command surface. Each command
//! corresponds to a handler in the [`super::commands`] module.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "zargo",
    version,
    about = "A package manager for Zig",
    long_about = "zargo resolves and fetches a Zig project's dependency graph, pins it in \
                  zargo.lock, and generates the deps.zig consumed by the Zig build system."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve and fetch all dependencies, refreshing zargo.lock and deps.zig
    Fetch {
        /// Use only cached dependencies; fail instead of touching the network
        #[arg(long)]
        offline: bool,
    },

    /// Drop pinned resolutions and fetch them again
    Update {
        /// Root dependency alias to refresh; refreshes every root when omitted
        alias: Option<String>,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}
