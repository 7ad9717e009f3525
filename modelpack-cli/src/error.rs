//! CLI error type and exit codes.

use std::fmt;

use modelpack::config::ConfigError;
use modelpack::logging::LoggingError;
use modelpack::manager::ManagerError;

/// Exit code for configuration and usage problems.
pub const EXIT_CONFIG: i32 = 2;

/// Exit code when the release has no archive parts.
pub const EXIT_NOT_FOUND: i32 = 3;

/// Exit code for a run cancelled with Ctrl+C.
pub const EXIT_CANCELLED: i32 = 130;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or missing settings.
    Config(String),
    /// Configuration file could not be read or written.
    ConfigFile(ConfigError),
    /// Logging could not be initialized.
    Logging(LoggingError),
    /// Async runtime could not be created.
    Runtime(std::io::Error),
    /// The install run failed.
    Install(ManagerError),
    /// The run was cancelled by the user.
    Cancelled,
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::ConfigFile(_) => EXIT_CONFIG,
            Self::Install(ManagerError::InvalidConfig(_)) => EXIT_CONFIG,
            Self::Install(e) if e.is_not_found() => EXIT_NOT_FOUND,
            Self::Install(ManagerError::Cancelled) | Self::Cancelled => EXIT_CANCELLED,
            Self::Logging(_) | Self::Runtime(_) | Self::Install(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "{}", msg),
            Self::ConfigFile(e) => write!(f, "{}", e),
            Self::Logging(e) => write!(f, "{}", e),
            Self::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            Self::Install(e) => write!(f, "{}", e),
            Self::Cancelled => write!(f, "Installation cancelled"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigFile(e) => Some(e),
            Self::Logging(e) => Some(e),
            Self::Runtime(e) => Some(e),
            Self::Install(e) => Some(e),
            Self::Config(_) | Self::Cancelled => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        Self::Logging(e)
    }
}

impl From<ManagerError> for CliError {
    fn from(e: ManagerError) -> Self {
        match e {
            ManagerError::Cancelled => Self::Cancelled,
            other => Self::Install(other),
        }
    }
}
