//! Tracing subscriber setup.
//!
//! Console output goes to stderr with local wall-clock timestamps. When a log
//! directory is given, a daily-rotated file is written as well through a
//! non-blocking writer; keep the returned guard alive until exit so buffered
//! lines are flushed.

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::macros::format_description;
pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// File name prefix for rotated log files.
pub const LOG_FILE_NAME: &str = "modelpack.log";

/// Errors from logging initialization.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid log filter '{0}'")]
    Filter(String),

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Build the level filter. `RUST_LOG` wins over `level` when set.
pub fn build_env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .map_err(|_| LoggingError::Filter(directives.clone())),
        _ => EnvFilter::try_new(level).map_err(|_| LoggingError::Filter(level.to_string())),
    }
}

/// Install the global subscriber.
///
/// Returns the file writer guard when `log_dir` is set.
pub fn init_logging(
    level: &str,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>, LoggingError> {
    let env_filter = build_env_filter(level)?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(LocalTime::new(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:3]"
        )));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;

            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::new(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
                )));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(guard)
}
