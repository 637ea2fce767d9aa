//! Guardpost CLI entry point.

use clap::Parser;

use guardpost::cli::{commands, handle_error, Cli, Commands};
use guardpost::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let json = cli.json;
    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, config, json).await,
        Commands::Alerts(args) => commands::alerts::execute(args, &config, json).await,
        Commands::Decisions(args) => commands::decisions::execute(args, &config, json).await,
        Commands::Validate(args) => commands::validate::execute(args, json),
        Commands::Decrypt(args) => commands::decrypt::execute(args, &config, json).await,
        Commands::Encrypt(args) => commands::encrypt::execute(args, &config, json),
    };

    if let Err(err) = result {
        handle_error(err, json);
    }
}
