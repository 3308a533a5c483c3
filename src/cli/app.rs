use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::commands::Commands;
use super::env::CliArgs;
use super::runtime::init_logging;
use super::{run, tools};
use crate::config::load_config;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();
    init_logging(&cli.log_level, cli.debug)?;

    info!("Starting WebRunner v{}", env!("CARGO_PKG_VERSION"));
    let loaded = load_config(cli.config.as_ref())?;

    let outcome = match cli.command {
        Commands::Run {
            plan,
            dry_run,
            json,
        } => run::execute(&loaded.config, &plan, dry_run, json).await,
        Commands::Tools => tools::list(),
        Commands::Config => {
            let yaml = serde_yaml::to_string(&loaded.config)?;
            println!("# effective configuration ({})", loaded.path.display());
            println!("{yaml}");
            Ok(())
        }
    };

    match outcome {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {err}");
            Err(err)
        }
    }
}
