use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Executable path for {0} cannot be empty")]
    EmptyExecutable(&'static str),

    #[error("Invalid gatekeeper max_requests: {0}. Must be at least 1")]
    InvalidMaxRequests(u32),

    #[error("Invalid gatekeeper window_secs: {0}. Must be at least 1")]
    InvalidWindow(u32),

    #[error("Invalid deepguard interval_secs: {0}. Must be at least 1")]
    InvalidMonitorInterval(u64),

    #[error("Invalid tail poll_interval_ms: {0}. Must be at least 1")]
    InvalidPollInterval(u64),

    #[error("Invalid {0}: {1}. Must be within [0, 1]")]
    InvalidMultiplier(&'static str, f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Cipher key is not set (configure tail.cipher_key or MONITOR_KEY)")]
    MissingCipherKey,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .guardpost/config.yaml
    /// 3. .guardpost/local.yaml (optional overrides)
    /// 4. Environment variables (GUARDPOST_* prefix, `__` for nesting)
    /// 5. MONITOR_KEY, the variable the monitor itself reads
    pub fn load() -> Result<Config> {
        let config: Config = Self::base()
            .merge(Yaml::file(".guardpost/config.yaml"))
            .merge(Yaml::file(".guardpost/local.yaml"))
            .merge(Self::env())
            .merge(Self::monitor_key_env())
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Self::warn_missing_key(&config);
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring the environment
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Self::base()
            .merge(Yaml::file(path.as_ref()))
            .merge(Self::env())
            .merge(Self::monitor_key_env())
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Self::warn_missing_key(&config);
        Ok(config)
    }

    fn base() -> Figment {
        Figment::new().merge(Serialized::defaults(Config::default()))
    }

    fn env() -> Env {
        Env::prefixed("GUARDPOST_").split("__")
    }

    fn monitor_key_env() -> Env {
        Env::raw()
            .only(&["MONITOR_KEY"])
            .map(|_| "tail.cipher_key".into())
    }

    fn warn_missing_key(config: &Config) {
        if config.tail.cipher_key.is_empty() {
            tracing::warn!("MONITOR_KEY not set; the monitor log cannot be decrypted");
        }
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.gatekeeper.executable.trim().is_empty() {
            return Err(ConfigError::EmptyExecutable("gatekeeper"));
        }
        if config.deepguard.executable.trim().is_empty() {
            return Err(ConfigError::EmptyExecutable("deepguard"));
        }

        if config.gatekeeper.max_requests == 0 {
            return Err(ConfigError::InvalidMaxRequests(config.gatekeeper.max_requests));
        }
        if config.gatekeeper.window_secs == 0 {
            return Err(ConfigError::InvalidWindow(config.gatekeeper.window_secs));
        }
        if config.deepguard.interval_secs == 0 {
            return Err(ConfigError::InvalidMonitorInterval(config.deepguard.interval_secs));
        }
        if config.tail.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidPollInterval(config.tail.poll_interval_ms));
        }

        for (name, value) in [
            ("throttle_multiplier", config.feedback.throttle_multiplier),
            ("restore_multiplier", config.feedback.restore_multiplier),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidMultiplier(name, value));
            }
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
