use super::config::{LogConfig, LogFormat, RotationPolicy};
use anyhow::{Context, Result};
use std::io;
use std::path::Path;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_NAME: &str = "guardpost.log";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Holds the file writer's guard; logs are flushed when this is dropped.
pub struct LoggerImpl {
    _guard: Option<WorkerGuard>,
}

impl LoggerImpl {
    /// Install the global subscriber.
    ///
    /// Stdout carries session output, so console logs go to stderr. `RUST_LOG`
    /// overrides the configured level.
    pub fn init(config: &LogConfig) -> Result<Self> {
        let level = parse_log_level(&config.level)?;
        let filter = || {
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy()
        };

        let console = config
            .enable_stderr
            .then(|| console_layer(config.format, filter()));

        let (file, guard) = match &config.log_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
                let (writer, guard) = tracing_appender::non_blocking(appender(dir, config.rotation));
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_current_span(true)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(filter())
                    .boxed();
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(console)
            .with(file)
            .try_init()
            .context("A global tracing subscriber is already installed")?;

        tracing::debug!(
            level = %config.level,
            format = ?config.format,
            log_dir = ?config.log_dir,
            "Logging ready"
        );

        Ok(Self { _guard: guard })
    }
}

fn console_layer<S>(format: LogFormat, filter: EnvFilter) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_target(true)
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_target(false)
            .with_filter(filter)
            .boxed(),
    }
}

fn appender(dir: &Path, rotation: RotationPolicy) -> RollingFileAppender {
    match rotation {
        RotationPolicy::Daily => rolling::daily(dir, LOG_FILE_NAME),
        RotationPolicy::Hourly => rolling::hourly(dir, LOG_FILE_NAME),
        RotationPolicy::Never => rolling::never(dir, LOG_FILE_NAME),
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    level
        .trim()
        .parse::<Level>()
        .map_err(|_| anyhow::anyhow!("Invalid log level: {level}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("trace").unwrap(), Level::TRACE);
        assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
        assert_eq!(parse_log_level("ERROR").unwrap(), Level::ERROR);
        assert_eq!(parse_log_level(" info ").unwrap(), Level::INFO);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_logger_init_with_file_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            level: "debug".to_string(),
            format: LogFormat::Json,
            log_dir: Some(dir.path().join("logs")),
            enable_stderr: false,
            rotation: RotationPolicy::Never,
        };

        // Installs the global subscriber; no other unit test does.
        let logger = LoggerImpl::init(&config).unwrap();
        assert!(dir.path().join("logs").is_dir());

        assert!(LoggerImpl::init(&config).is_err());
        drop(logger);
    }
}
