//! Error types for the installer.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur while resolving, downloading or installing a package.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Connection failure or unexpected HTTP status.
    #[error("request to {url} failed: {reason}")]
    Transport {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// Request exceeded its timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Server sent something that cannot be interpreted.
    #[error("protocol error from {url}: {reason}")]
    Protocol { url: String, reason: String },

    /// Redirect chain exceeded the hop limit.
    #[error("too many redirects (>{limit}) starting at {url}")]
    TooManyRedirects { url: String, limit: usize },

    /// No parts matched the identifier.
    #[error("no package parts found for {identifier}")]
    NotFound { identifier: String },

    /// A part could not be downloaded within its retry budget.
    #[error("download of {part} failed after {attempts} attempt(s): {source}")]
    DownloadFailed {
        part: String,
        attempts: u32,
        #[source]
        source: Box<ManagerError>,
    },

    /// The external archiver exited unsuccessfully.
    #[error(
        "extraction failed (exit code {}): {diagnostic_output}",
        .exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string())
    )]
    ExtractionFailed {
        exit_code: Option<i32>,
        diagnostic_output: String,
    },

    /// Extraction finished but the output does not look installed.
    #[error("installation at {} is incomplete: {reason}", .path.display())]
    IncompleteInstall { path: PathBuf, reason: String },

    /// Another install run is in progress.
    #[error("an installation is already running")]
    AlreadyRunning,

    /// The caller cancelled the run.
    #[error("installation cancelled")]
    Cancelled,

    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Downloaded part has the wrong length.
    #[error("size mismatch for {part}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        part: String,
        expected: u64,
        actual: u64,
    },

    /// Downloaded part has the wrong digest.
    #[error("checksum mismatch for {part}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        part: String,
        expected: String,
        actual: String,
    },

    /// Not enough disk space for the remaining download.
    #[error(
        "insufficient space on {}: need {required} bytes, {available} available",
        .path.display()
    )]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    /// No archiver binary could be found.
    #[error("archiver not found (tried: {tried})")]
    ArchiverNotFound { tried: String },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ManagerError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build a transport error for an unexpected HTTP status.
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Transport {
            url: url.into(),
            status: Some(status),
            reason: format!("unexpected HTTP status {}", status),
        }
    }

    /// HTTP status carried by a transport error.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            Self::DownloadFailed { source, .. } => source.http_status(),
            _ => None,
        }
    }

    /// Whether the error means "nothing there" rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. }) || self.http_status() == Some(404)
    }

    /// Whether a download attempt that failed with this error may be retried.
    ///
    /// Client-side HTTP statuses other than 408 and 429 are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { status, .. } => match status {
                Some(code) if (400..500).contains(code) => matches!(*code, 408 | 429),
                _ => true,
            },
            Self::Timeout { .. } | Self::SizeMismatch { .. } | Self::ChecksumMismatch { .. } => {
                true
            }
            _ => false,
        }
    }
}
