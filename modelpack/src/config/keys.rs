//! Addressable configuration keys.
//!
//! Each key maps a `section.key` name onto a [`ConfigFile`] field and owns
//! the parsing and validation of its value. The file loader goes through the
//! same setters, so a value accepted by `config set` always loads back.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::{ConfigError, ConfigFile};
use crate::manager::download::MAX_ATTEMPTS_LIMIT;
use crate::package::{PackageIdentifier, DEFAULT_ASSET_PREFIX, LATEST_TAG};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A configuration setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    PackageRepository,
    PackageTag,
    PackageAssetPrefix,
    PackageAccessToken,
    InstallOutputDir,
    InstallStagingDir,
    InstallMarker,
    InstallArchiver,
    InstallCleanOutputDir,
    DownloadTimeout,
    DownloadConnectTimeout,
    DownloadReadTimeout,
    DownloadMaxAttempts,
    DownloadInitialBackoffMs,
    DownloadMaxBackoffSecs,
    DownloadMaxRedirects,
    LoggingLevel,
    LoggingFile,
}

impl ConfigKey {
    /// Every key, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            Self::PackageRepository,
            Self::PackageTag,
            Self::PackageAssetPrefix,
            Self::PackageAccessToken,
            Self::InstallOutputDir,
            Self::InstallStagingDir,
            Self::InstallMarker,
            Self::InstallArchiver,
            Self::InstallCleanOutputDir,
            Self::DownloadTimeout,
            Self::DownloadConnectTimeout,
            Self::DownloadReadTimeout,
            Self::DownloadMaxAttempts,
            Self::DownloadInitialBackoffMs,
            Self::DownloadMaxBackoffSecs,
            Self::DownloadMaxRedirects,
            Self::LoggingLevel,
            Self::LoggingFile,
        ]
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PackageRepository => "package.repository",
            Self::PackageTag => "package.tag",
            Self::PackageAssetPrefix => "package.asset_prefix",
            Self::PackageAccessToken => "package.access_token",
            Self::InstallOutputDir => "install.output_dir",
            Self::InstallStagingDir => "install.staging_dir",
            Self::InstallMarker => "install.marker",
            Self::InstallArchiver => "install.archiver",
            Self::InstallCleanOutputDir => "install.clean_output_dir",
            Self::DownloadTimeout => "download.timeout",
            Self::DownloadConnectTimeout => "download.connect_timeout",
            Self::DownloadReadTimeout => "download.read_timeout",
            Self::DownloadMaxAttempts => "download.max_attempts",
            Self::DownloadInitialBackoffMs => "download.initial_backoff_ms",
            Self::DownloadMaxBackoffSecs => "download.max_backoff_secs",
            Self::DownloadMaxRedirects => "download.max_redirects",
            Self::LoggingLevel => "logging.level",
            Self::LoggingFile => "logging.file",
        }
    }

    /// INI section name.
    pub fn section(&self) -> &'static str {
        self.split().0
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        self.split().1
    }

    fn split(&self) -> (&'static str, &'static str) {
        let name = self.name();
        name.split_once('.').unwrap_or((name, ""))
    }

    /// Whether the value should be masked in listings.
    pub fn is_secret(&self) -> bool {
        matches!(self, Self::PackageAccessToken)
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };

        match self {
            Self::PackageRepository => config.package.repository.clone(),
            Self::PackageTag => config.package.tag.clone(),
            Self::PackageAssetPrefix => config.package.asset_prefix.clone(),
            Self::PackageAccessToken => config.package.access_token.clone().unwrap_or_default(),
            Self::InstallOutputDir => path(&config.install.output_dir),
            Self::InstallStagingDir => config.install.staging_dir.display().to_string(),
            Self::InstallMarker => path(&config.install.marker),
            Self::InstallArchiver => path(&config.install.archiver),
            Self::InstallCleanOutputDir => config.install.clean_output_dir.to_string(),
            Self::DownloadTimeout => config.download.timeout_secs.to_string(),
            Self::DownloadConnectTimeout => config.download.connect_timeout_secs.to_string(),
            Self::DownloadReadTimeout => config.download.read_timeout_secs.to_string(),
            Self::DownloadMaxAttempts => config.download.max_attempts.to_string(),
            Self::DownloadInitialBackoffMs => config.download.initial_backoff_ms.to_string(),
            Self::DownloadMaxBackoffSecs => config.download.max_backoff_secs.to_string(),
            Self::DownloadMaxRedirects => config.download.max_redirects.to_string(),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingFile => path(&config.logging.file),
        }
    }

    /// Validate `value` and store it.
    ///
    /// An empty value clears optional settings and restores the default of
    /// the others that have one.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();

        match self {
            Self::PackageRepository => {
                if !value.is_empty() && !PackageIdentifier::new(value).is_valid_repository() {
                    return Err(self.invalid("expected owner/name"));
                }
                config.package.repository = value.trim_matches('/').to_string();
            }
            Self::PackageTag => {
                config.package.tag = if value.is_empty() {
                    LATEST_TAG.to_string()
                } else {
                    value.to_string()
                };
            }
            Self::PackageAssetPrefix => {
                if value.chars().any(|c| c == '/' || c == '\\') {
                    return Err(self.invalid("must be a file name prefix"));
                }
                config.package.asset_prefix = if value.is_empty() {
                    DEFAULT_ASSET_PREFIX.to_string()
                } else {
                    value.to_string()
                };
            }
            Self::PackageAccessToken => {
                config.package.access_token = optional(value).map(str::to_string);
            }
            Self::InstallOutputDir => {
                config.install.output_dir = optional(value).map(PathBuf::from);
            }
            Self::InstallStagingDir => {
                if value.is_empty() {
                    return Err(self.invalid("must not be empty"));
                }
                config.install.staging_dir = PathBuf::from(value);
            }
            Self::InstallMarker => {
                let marker = optional(value).map(PathBuf::from);
                if marker.as_ref().is_some_and(|m| m.is_absolute()) {
                    return Err(self.invalid("must be relative to the output directory"));
                }
                config.install.marker = marker;
            }
            Self::InstallArchiver => config.install.archiver = optional(value).map(PathBuf::from),
            Self::InstallCleanOutputDir => {
                config.install.clean_output_dir = self.parse_bool(value)?;
            }
            Self::DownloadTimeout => config.download.timeout_secs = self.parse_positive(value)?,
            Self::DownloadConnectTimeout => {
                config.download.connect_timeout_secs = self.parse_positive(value)?
            }
            Self::DownloadReadTimeout => {
                config.download.read_timeout_secs = self.parse_positive(value)?
            }
            Self::DownloadMaxAttempts => {
                let attempts: u32 = self.parse_number(value)?;
                if attempts == 0 || attempts > MAX_ATTEMPTS_LIMIT {
                    return Err(self.invalid(format!(
                        "must be between 1 and {}",
                        MAX_ATTEMPTS_LIMIT
                    )));
                }
                config.download.max_attempts = attempts;
            }
            Self::DownloadInitialBackoffMs => {
                config.download.initial_backoff_ms = self.parse_number(value)?
            }
            Self::DownloadMaxBackoffSecs => {
                config.download.max_backoff_secs = self.parse_number(value)?;
            }
            Self::DownloadMaxRedirects => {
                config.download.max_redirects = self.parse_number(value)?;
            }
            Self::LoggingLevel => {
                let level = value.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(self.invalid(format!("expected one of {}", LOG_LEVELS.join(", "))));
                }
                config.logging.level = level;
            }
            Self::LoggingFile => config.logging.file = optional(value).map(PathBuf::from),
        }

        Ok(())
    }

    fn invalid(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name().to_string(),
            reason: reason.into(),
        }
    }

    fn parse_number<T: FromStr>(&self, value: &str) -> Result<T, ConfigError> {
        value
            .parse()
            .map_err(|_| self.invalid(format!("'{}' is not a valid number", value)))
    }

    fn parse_positive(&self, value: &str) -> Result<u64, ConfigError> {
        match self.parse_number(value)? {
            0 => Err(self.invalid("must be greater than zero")),
            n => Ok(n),
        }
    }

    fn parse_bool(&self, value: &str) -> Result<bool, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid("expected true or false")),
        }
    }
}

fn optional(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
