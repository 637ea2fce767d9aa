use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use super::configured_cipher;
use crate::cli::display::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// Plaintext to encrypt (words are joined with single spaces)
    #[arg(required = true)]
    pub text: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EncryptedRecord {
    pub record: String,
}

impl CommandOutput for EncryptedRecord {
    fn to_human(&self) -> String {
        self.record.clone()
    }
}

pub fn execute(args: EncryptArgs, config: &Config, json: bool) -> Result<()> {
    let cipher = configured_cipher(config)?;
    let record = cipher
        .encrypt_line(&args.text.join(" "))
        .context("Failed to encrypt line")?;
    output(&EncryptedRecord { record }, json);
    Ok(())
}
