//! CLI command implementations.

pub mod alerts;
pub mod decisions;
pub mod decrypt;
pub mod encrypt;
pub mod run;
pub mod validate;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::adapters::sqlite::{initialize_from_config, SqliteAuditStore};
use crate::domain::models::Config;
use crate::domain::ports::{AuditStore, DEFAULT_LIST_LIMIT};
use crate::infrastructure::config::ConfigError;
use crate::infrastructure::crypto::{build_cipher, LineCipher};

/// Shared arguments for audit listings.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Maximum number of records to show
    #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
    pub limit: usize,
}

/// Open the configured audit database.
pub(crate) async fn open_audit_store(config: &Config) -> Result<Arc<dyn AuditStore>> {
    let pool = initialize_from_config(&config.database)
        .await
        .with_context(|| format!("Failed to open audit database at {}", config.database.path))?;
    Ok(Arc::new(SqliteAuditStore::new(pool)))
}

/// The configured log cipher; the key must be set.
pub(crate) fn configured_cipher(config: &Config) -> Result<Arc<dyn LineCipher>> {
    if config.tail.cipher_key.is_empty() {
        return Err(ConfigError::MissingCipherKey.into());
    }
    build_cipher(config.tail.cipher, &config.tail.cipher_key).context("Failed to build log cipher")
}
