//! Configuration for the installer.

use std::path::PathBuf;
use std::time::Duration;

use super::download::{RetryPolicy, DEFAULT_PROGRESS_INTERVAL};
use super::error::{ManagerError, ManagerResult};
use super::resolver::{DEFAULT_API_BASE, DEFAULT_DOWNLOAD_BASE, DEFAULT_MAX_PROBE_PARTS};
use super::transport::DEFAULT_MAX_REDIRECTS;

/// Default per-request timeout, covering the whole body read.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default limit on a single socket read before the attempt is abandoned.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Default free-space margin on top of the remaining download (256 MiB).
pub const DEFAULT_SPACE_HEADROOM: u64 = 256 * 1024 * 1024;

/// Configuration for the installer.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory for part files while downloading.
    pub staging_dir: PathBuf,

    /// Release metadata API base URL.
    pub api_base: String,

    /// Base URL for direct asset downloads.
    pub download_base: String,

    /// HTTP request timeout, including the body read.
    pub timeout: Duration,

    /// TCP connect timeout.
    pub connect_timeout: Duration,

    /// Longest wait for the next bytes of a response.
    pub read_timeout: Duration,

    /// Retry policy applied per part.
    pub retry: RetryPolicy,

    /// Redirect hop limit per request.
    pub max_redirects: usize,

    /// Upper bound on parts found by probing.
    pub max_probe_parts: u32,

    /// Minimum interval between progress events.
    pub progress_interval: Duration,

    /// Archiver binary; located on `PATH` when unset.
    pub archiver: Option<PathBuf>,

    /// Path, relative to the output directory, that must exist after extraction.
    pub marker: Option<PathBuf>,

    /// Whether to empty the output directory before extracting.
    pub clean_output_dir: bool,

    /// Whether to check free space before downloading.
    pub check_free_space: bool,

    /// Extra bytes required on top of the remaining download.
    pub space_headroom: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir().join("modelpack-staging"),
            api_base: DEFAULT_API_BASE.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_probe_parts: DEFAULT_MAX_PROBE_PARTS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            archiver: None,
            marker: None,
            clean_output_dir: false,
            check_free_space: true,
            space_headroom: DEFAULT_SPACE_HEADROOM,
        }
    }
}

impl ManagerConfig {
    /// Create a new configuration with the given staging directory.
    pub fn new(staging_dir: PathBuf) -> Self {
        Self {
            staging_dir,
            ..Default::default()
        }
    }

    /// Set the staging directory.
    pub fn with_staging_dir(mut self, path: PathBuf) -> Self {
        self.staging_dir = path;
        self
    }

    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into();
        self
    }

    pub fn with_download_base(mut self, url: impl Into<String>) -> Self {
        self.download_base = url.into();
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn with_max_probe_parts(mut self, max: u32) -> Self {
        self.max_probe_parts = max;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Use a specific archiver binary.
    pub fn with_archiver(mut self, path: impl Into<PathBuf>) -> Self {
        self.archiver = Some(path.into());
        self
    }

    /// Require `path` (relative to the output directory) after extraction.
    pub fn with_marker(mut self, path: impl Into<PathBuf>) -> Self {
        self.marker = Some(path.into());
        self
    }

    /// Enable or disable clearing the output directory before extraction.
    pub fn with_clean_output_dir(mut self, clean: bool) -> Self {
        self.clean_output_dir = clean;
        self
    }

    /// Enable or disable the free-space preflight.
    pub fn with_check_free_space(mut self, check: bool) -> Self {
        self.check_free_space = check;
        self
    }

    pub fn with_space_headroom(mut self, bytes: u64) -> Self {
        self.space_headroom = bytes;
        self
    }

    /// Reject settings the installer cannot run with.
    pub fn validate(&self) -> ManagerResult<()> {
        if self.retry.max_attempts() == 0 {
            return Err(ManagerError::InvalidConfig(
                "retry policy must allow at least one attempt".to_string(),
            ));
        }
        if self.timeout.is_zero() || self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(ManagerError::InvalidConfig(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        if self.staging_dir.as_os_str().is_empty() {
            return Err(ManagerError::InvalidConfig(
                "staging directory is not set".to_string(),
            ));
        }
        if let Some(marker) = &self.marker {
            if marker.is_absolute() {
                return Err(ManagerError::InvalidConfig(format!(
                    "marker must be relative to the output directory: {}",
                    marker.display()
                )));
            }
        }
        Ok(())
    }
}
