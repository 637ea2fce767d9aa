use serde::{Deserialize, Serialize};

/// Main configuration structure for Guardpost
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Rate-limiter worker
    #[serde(default)]
    pub gatekeeper: GatekeeperConfig,

    /// Resource-monitor worker
    #[serde(default)]
    pub deepguard: DeepGuardConfig,

    /// Encrypted log tailing
    #[serde(default)]
    pub tail: TailConfig,

    /// Throttle feedback loop
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Audit database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rate-limiter worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GatekeeperConfig {
    /// Path to the limiter executable
    #[serde(default = "default_gatekeeper_executable")]
    pub executable: String,

    /// Requests allowed per window, sent as the first startup line
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds, sent as the second startup line
    #[serde(default = "default_window_secs")]
    pub window_secs: u32,
}

fn default_gatekeeper_executable() -> String {
    "bin/gatekeeper".to_string()
}

const fn default_max_requests() -> u32 {
    100
}

const fn default_window_secs() -> u32 {
    60
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            executable: default_gatekeeper_executable(),
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

/// Resource-monitor worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeepGuardConfig {
    /// Path to the monitor executable
    #[serde(default = "default_deepguard_executable")]
    pub executable: String,

    /// CPU-load threshold answered to the first prompt
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: String,

    /// RAM threshold answered to the second prompt (empty line when unset)
    #[serde(default = "default_ram_threshold")]
    pub ram_threshold: Option<String>,

    /// Check interval in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Encrypted alert log the monitor appends to
    #[serde(default = "default_log_path")]
    pub log_path: String,

    /// Delay before each handshake prompt
    #[serde(default = "default_prompt_delay_ms")]
    pub prompt_delay_ms: u64,
}

fn default_deepguard_executable() -> String {
    "bin/deepguard".to_string()
}

fn default_cpu_threshold() -> String {
    "0.5".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_ram_threshold() -> Option<String> {
    Some("80.0".to_string())
}

const fn default_interval_secs() -> u64 {
    5
}

fn default_log_path() -> String {
    ".guardpost/alerts.log".to_string()
}

const fn default_prompt_delay_ms() -> u64 {
    500
}

impl Default for DeepGuardConfig {
    fn default() -> Self {
        Self {
            executable: default_deepguard_executable(),
            cpu_threshold: default_cpu_threshold(),
            ram_threshold: default_ram_threshold(),
            interval_secs: default_interval_secs(),
            log_path: default_log_path(),
            prompt_delay_ms: default_prompt_delay_ms(),
        }
    }
}

/// Which scheme encrypts the monitor's log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CipherKind {
    /// Hex of a 16-byte IV followed by AES-256-CBC ciphertext
    #[default]
    AesCbc,
    /// Hex of a repeating-key XOR over SHA-256 of the secret
    XorStream,
}

/// Log tailing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TailConfig {
    /// Poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Cipher scheme of the log file
    #[serde(default)]
    pub cipher: CipherKind,

    /// Shared secret (also passed to the monitor as `MONITOR_KEY`)
    #[serde(default)]
    pub cipher_key: String,
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            cipher: CipherKind::default(),
            cipher_key: String::new(),
        }
    }
}

/// Feedback loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FeedbackConfig {
    /// Whether classified lines drive throttle directives at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Multiplier sent on resource pressure
    #[serde(default = "default_throttle_multiplier")]
    pub throttle_multiplier: f64,

    /// Multiplier sent on recovery
    #[serde(default = "default_restore_multiplier")]
    pub restore_multiplier: f64,
}

const fn default_true() -> bool {
    true
}

const fn default_throttle_multiplier() -> f64 {
    0.2
}

const fn default_restore_multiplier() -> f64 {
    1.0
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            throttle_multiplier: default_throttle_multiplier(),
            restore_multiplier: default_restore_multiplier(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".guardpost/audit_trail.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation policy for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
