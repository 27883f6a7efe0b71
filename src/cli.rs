use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ilrt")]
#[command(author, version, about = "OpenMAX IL component runtime")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a component graph and run its script
    Run {
        /// Graph description (TOML)
        #[arg(required = true)]
        graph: PathBuf,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,

        /// Also print every event the components emitted
        #[arg(long)]
        events: bool,
    },

    /// Validate a graph description without running it
    Validate {
        /// Graph description (TOML)
        #[arg(required = true)]
        graph: PathBuf,
    },

    /// Print the lifecycle state table
    States,

    /// Display version information
    Version,
}
