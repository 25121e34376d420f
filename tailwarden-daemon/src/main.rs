use anyhow::Result;
use clap::Parser;

use tailwarden_daemon::cli::Cli;
use tailwarden_daemon::logging;
use tailwarden_daemon::orchestrator::{Orchestrator, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, rejected_overrides) = load_config(cli.config.as_deref()).await?;
    if let Err(e) = cli.apply_overrides(&mut config) {
        e.exit();
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    logging::init_tracing(&config.general)?;
    for rejected in &rejected_overrides {
        rejected.report();
    }

    let orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;
    Ok(())
}
