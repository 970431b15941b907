//! src/logging.rs
//! ============================================================================
//! # Logging: JSON lines through a rolling, non-blocking file appender
//!
//! `Logger::init` installs the global `tracing` subscriber once per process and
//! hands back the `WorkerGuard`; dropping the guard flushes pending lines, so
//! hosts keep it alive for the whole session.

use std::{
    path::{Component, Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,
    pub log_file_prefix: CompactString,

    /// Default filter directive; `RUST_LOG` takes precedence when set
    pub log_level: CompactString,

    pub max_log_files: usize,
    pub rotation: LogRotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    Hourly,
    Daily,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: CompactString::const_new("docify"),
            log_level: CompactString::const_new("info"),
            max_log_files: 10,
            rotation: LogRotation::Daily,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logger already initialized")]
    AlreadyInitialized,

    #[error("Invalid log directory: {0}")]
    InvalidLogDirectory(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Entry point used by hosts.
pub struct Logger;

impl Logger {
    pub async fn init(config: &LoggerConfig) -> Result<WorkerGuard> {
        LoggerBuilder::new().with_config(config.clone()).build().await
    }
}

pub struct LoggerBuilder {
    config: LoggerConfig,
}

impl LoggerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_directory<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.log_dir = dir.as_ref().to_path_buf();
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.config.log_level = CompactString::new(level);
        self
    }

    pub async fn build(self) -> Result<WorkerGuard> {
        validate_config(&self.config)?;
        setup_log_directory(&self.config.log_dir).await?;

        let file_appender = RollingFileAppender::builder()
            .rotation(self.config.rotation.into())
            .filename_prefix(self.config.log_file_prefix.as_str())
            .filename_suffix("jsonl")
            .max_log_files(self.config.max_log_files)
            .build(&self.config.log_dir)
            .context("Failed to create file appender")?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(non_blocking)
            .with_filter(make_filter(&self.config.log_level)?);

        tracing_subscriber::registry()
            .with(json_layer)
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)
            .context("Failed to install global tracing subscriber")?;

        Ok(guard)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `RUST_LOG` when set, else the configured level.
fn make_filter(level: &str) -> Result<EnvFilter> {
    let directive = Directive::from_str(level).context("Invalid log level in config")?;

    Ok(EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(directive)))
}

fn validate_config(config: &LoggerConfig) -> Result<()> {
    if config.log_level.trim().is_empty() {
        return Err(LoggingError::ConfigError("Log level must not be empty".to_string()).into());
    }

    if config.log_file_prefix.is_empty() {
        return Err(
            LoggingError::ConfigError("Log file prefix must not be empty".to_string()).into(),
        );
    }

    if config.max_log_files == 0 {
        return Err(
            LoggingError::ConfigError("Max log files must be greater than 0".to_string()).into(),
        );
    }

    validate_log_directory(&config.log_dir)?;
    Ok(())
}

fn validate_log_directory(path: &Path) -> Result<()> {
    if path.components().count() == 0 {
        return Err(LoggingError::InvalidLogDirectory("Empty path".to_string()).into());
    }

    if path.components().any(|c| c == Component::ParentDir) {
        return Err(LoggingError::InvalidLogDirectory(
            "Path contains parent directory references".to_string(),
        )
        .into());
    }

    Ok(())
}

async fn setup_log_directory(log_dir: &Path) -> Result<()> {
    if !log_dir.exists() {
        TokioFs::create_dir_all(log_dir)
            .await
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }
    Ok(())
}
