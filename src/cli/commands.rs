use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Execute a plan file
    Run {
        /// Path to the plan JSON file
        #[arg(short, long, value_name = "FILE")]
        plan: PathBuf,

        /// Execute against the built-in scripted agent instead of a real
        /// browser driver
        #[arg(long)]
        dry_run: bool,

        /// Print the full task result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List registered tool schemas
    Tools,

    /// Show the effective configuration
    Config,
}
