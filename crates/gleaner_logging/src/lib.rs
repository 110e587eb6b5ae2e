//! Shared logging utilities for Gleaner binaries.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "gleaner=info,gleaner_protocol=info";

/// Logging configuration shared by Gleaner binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Also write a daily-rotated log file under the Gleaner home directory.
    pub log_to_file: bool,
}

/// Initialize tracing with a stderr layer and an optional rolling file layer.
///
/// Returns the appender guard; hold it for the process lifetime so buffered
/// log lines are flushed on exit.
pub fn init_logging(config: LogConfig<'_>) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        EnvFilter::new("debug")
    } else {
        env_filter
    };

    if config.log_to_file {
        let log_dir = ensure_logs_dir().context("Failed to ensure log directory")?;
        let appender = tracing_appender::rolling::daily(log_dir, format!("{}.log", config.app_name));
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let file_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(file_filter),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(console_filter),
            )
            .init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(console_filter),
            )
            .init();
        Ok(None)
    }
}

/// Resolve the Gleaner home directory.
///
/// Priority:
/// 1) GLEANER_HOME
/// 2) HOME/USERPROFILE
/// 3) ./.gleaner
pub fn gleaner_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("GLEANER_HOME") {
        return PathBuf::from(override_path);
    }
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        return PathBuf::from(home).join(".gleaner");
    }
    PathBuf::from(".").join(".gleaner")
}

/// Logs directory: `{home}/logs`.
pub fn logs_dir() -> PathBuf {
    gleaner_home().join("logs")
}

/// Ensure the logs directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    fs::create_dir_all(&logs)
        .with_context(|| format!("Failed to create logs directory: {}", logs.display()))?;
    Ok(logs)
}
