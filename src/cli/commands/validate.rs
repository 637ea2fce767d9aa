use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::display::{action_failure, action_success, output, CommandOutput};
use crate::services::command_validator;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Command words, e.g. `check alice`
    #[arg(required = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub command: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationReport {
    pub fn for_command(command: String) -> Self {
        let reason = command_validator::check(&command)
            .err()
            .map(|rejection| rejection.to_string());
        Self {
            valid: reason.is_none(),
            command,
            reason,
        }
    }
}

impl CommandOutput for ValidationReport {
    fn to_human(&self) -> String {
        match &self.reason {
            None => action_success(&format!("`{}` is accepted", self.command)),
            Some(reason) => action_failure(&format!("`{}` is rejected: {reason}", self.command)),
        }
    }
}

pub fn execute(args: ValidateArgs, json: bool) -> Result<()> {
    output(&ValidationReport::for_command(args.command.join(" ")), json);
    Ok(())
}
