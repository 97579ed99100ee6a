//! DeployMate - minimal declarative remote configuration over SSH
//!
//! This is the main entry point for the DeployMate CLI.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use deploymate::callback::{CallbackSet, LogCallback, RecapCallback};
use deploymate::cli::Cli;
use deploymate::config::Config;
use deploymate::connection::{ConnectionManager, SshConnector};
use deploymate::executor::ExecutionEngine;
use deploymate::modules::HandlerRegistry;
use deploymate::provider::{DataProvider, YamlDataProvider};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_logging(&cli);

    let exit_code = match run(&cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging from `-v` unless RUST_LOG is set
fn init_logging(cli: &Cli) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(cli.verbosity() >= 2))
        .with(env_filter)
        .init();
}

/// Everything that can fail here happens before the first connection
async fn run(cli: &Cli) -> Result<()> {
    cli.validate_inputs()?;

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.key_dir {
        config.defaults.key_dir = dir.clone();
    }
    if let Some(dir) = &cli.files_dir {
        config.defaults.files_dir = dir.clone();
    }

    let provider = YamlDataProvider::new(config.key_dir());
    let playbook = provider.parse_playbook(&cli.playbook).await?;
    let inventory = provider.parse_inventory(&cli.inventory).await?;

    for task in playbook.invalid_tasks() {
        if let Err(e) = &task.resource {
            warn!(task = %task.name, error = %e, "Task failed validation and will not be applied");
        }
    }

    let registry = HandlerRegistry::new(config.handler_settings()?);
    let connector = SshConnector::new(config.to_connection_config());
    let mut connections = ConnectionManager::new(Arc::new(connector));

    let callbacks = CallbackSet::new()
        .with(LogCallback::new())
        .with(RecapCallback::new());
    let engine = ExecutionEngine::new(registry).with_callback(Arc::new(callbacks));

    engine.run(&playbook, &inventory, &mut connections).await;
    Ok(())
}
