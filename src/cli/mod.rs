//! Command-line interface.

pub mod commands;
pub mod display;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Parser, Debug)]
#[command(name = "guardpost", version, about = "Supervise the Gatekeeper limiter and DeepGuard monitor")]
pub struct Cli {
    /// Output machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .guardpost/config.yaml + local.yaml)
    #[arg(short, long, global = true, env = "GUARDPOST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the control plane and read operator commands from stdin
    Run(commands::run::RunArgs),
    /// List recent monitor alerts
    Alerts(commands::ListArgs),
    /// List recent limiter decisions
    Decisions(commands::ListArgs),
    /// Check whether an operator command would be accepted
    Validate(commands::validate::ValidateArgs),
    /// Decrypt and classify an encrypted monitor log
    Decrypt(commands::decrypt::DecryptArgs),
    /// Encrypt one line in the monitor log format
    Encrypt(commands::encrypt::EncryptArgs),
}

impl Cli {
    pub fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(),
        }
    }
}

/// Print the error in the selected output mode and exit non-zero.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    if json {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({ "error": err.to_string(), "causes": chain });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{}", display::action_failure(&format!("{err:#}")));
    }
    std::process::exit(1)
}
