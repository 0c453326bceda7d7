//! swarmlab CLI entry point.

use anyhow::Result;
use clap::Parser;

use swarmlab::cli::{Cli, Commands};
use swarmlab::domain::models::Config;
use swarmlab::infrastructure::config::ConfigLoader;
use swarmlab::infrastructure::logging::{LogConfig, LoggerImpl};

fn load_settings(cli: &Cli) -> Result<Config> {
    let mut settings = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(level) = &cli.log_level {
        settings.logging.level.clone_from(level);
    }
    Ok(settings)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(err) => swarmlab::cli::handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&settings.logging)) {
        Ok(logger) => logger,
        Err(err) => swarmlab::cli::handle_error(err, cli.json),
    };

    let result = match &cli.command {
        Commands::Run(args) => {
            swarmlab::cli::commands::run::execute(args.clone(), &settings, cli.json).await
        }
        Commands::Validate(args) => {
            swarmlab::cli::commands::validate::execute(args, &settings, cli.json)
        }
    };

    if let Err(err) = result {
        swarmlab::cli::handle_error(err, cli.json);
    }
}
