//! INI-backed configuration file.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::{debug, warn};

use super::keys::ConfigKey;
use crate::manager::download::{
    RetryPolicy, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_SECS,
};
use crate::manager::{
    ManagerConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_REDIRECTS, DEFAULT_READ_TIMEOUT_SECS,
    DEFAULT_TIMEOUT_SECS,
};
use crate::package::{PackageIdentifier, ReleaseTag, DEFAULT_ASSET_PREFIX, LATEST_TAG};

/// Overrides the install output directory.
pub const ENV_OUTPUT_DIR: &str = "MODELPACK_OUTPUT_DIR";

/// Access token for the release host.
pub const ENV_TOKEN: &str = "MODELPACK_TOKEN";

/// Token fallback when [`ENV_TOKEN`] is unset.
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";

const CONFIG_DIR_NAME: &str = ".modelpack";
const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors from loading, saving or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("{0} is not set")]
    MissingValue(String),
}

/// `[package]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSettings {
    /// Repository in `owner/name` form; empty when unset.
    pub repository: String,
    pub tag: String,
    pub asset_prefix: String,
    pub access_token: Option<String>,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            repository: String::new(),
            tag: LATEST_TAG.to_string(),
            asset_prefix: DEFAULT_ASSET_PREFIX.to_string(),
            access_token: None,
        }
    }
}

/// `[install]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSettings {
    /// Extraction target; [`default_output_dir`] when unset.
    pub output_dir: Option<PathBuf>,
    pub staging_dir: PathBuf,
    /// File that must exist under the output directory after extraction.
    pub marker: Option<PathBuf>,
    /// Archiver binary; searched on `PATH` when unset.
    pub archiver: Option<PathBuf>,
    pub clean_output_dir: bool,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            output_dir: None,
            staging_dir: ManagerConfig::default().staging_dir,
            marker: None,
            archiver: None,
            clean_output_dir: false,
        }
    }
}

/// `[download]` section. Durations are stored in the units of their keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_secs: u64,
    pub max_redirects: usize,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: DEFAULT_INITIAL_DELAY_MS,
            max_backoff_secs: DEFAULT_MAX_DELAY_SECS,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    /// Directory for rotated log files; console only when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// The parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub package: PackageSettings,
    pub install: InstallSettings,
    pub download: DownloadSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from [`config_file_path`]. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from a specific path. A missing file yields defaults.
    ///
    /// Unknown keys are ignored; invalid values are errors.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for (section, properties) in ini.iter() {
            let Some(section) = section else { continue };
            for (key, value) in properties.iter() {
                let name = format!("{}.{}", section, key);
                match name.parse::<ConfigKey>() {
                    Ok(config_key) => config_key.set(&mut config, value)?,
                    Err(_) => warn!(key = %name, "ignoring unknown configuration key"),
                }
            }
        }

        Ok(config)
    }

    /// Save to [`config_file_path`], creating the directory when needed.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to a specific path. Unset values are omitted.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        self.to_ini()
            .write_to_file(path)
            .map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }
        ini
    }

    /// Apply `MODELPACK_*` environment overrides.
    ///
    /// Overrides are not persisted by [`save`](Self::save) callers that load
    /// the file separately.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup`.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty(ENV_OUTPUT_DIR) {
            self.install.output_dir = Some(PathBuf::from(dir));
        }
        if let Some(token) = non_empty(ENV_TOKEN).or_else(|| non_empty(ENV_GITHUB_TOKEN)) {
            self.package.access_token = Some(token);
        }
        self
    }

    /// Identifier of the configured package.
    pub fn package_identifier(&self) -> Result<PackageIdentifier, ConfigError> {
        if self.package.repository.is_empty() {
            return Err(ConfigError::MissingValue(
                ConfigKey::PackageRepository.name().to_string(),
            ));
        }

        Ok(PackageIdentifier::new(self.package.repository.clone())
            .with_tag(ReleaseTag::parse(&self.package.tag))
            .with_asset_prefix(self.package.asset_prefix.clone())
            .with_access_token(self.package.access_token.clone()))
    }

    /// Output directory, falling back to [`default_output_dir`].
    pub fn output_dir(&self) -> PathBuf {
        self.install
            .output_dir
            .clone()
            .unwrap_or_else(default_output_dir)
    }

    /// Build the installer configuration.
    pub fn to_manager_config(&self) -> ManagerConfig {
        let download = &self.download;
        let retry = RetryPolicy::exponential_with(
            download.max_attempts,
            Duration::from_millis(download.initial_backoff_ms),
            Duration::from_secs(download.max_backoff_secs),
        );

        let mut config = ManagerConfig::new(self.install.staging_dir.clone())
            .with_timeout(Duration::from_secs(download.timeout_secs))
            .with_connect_timeout(Duration::from_secs(download.connect_timeout_secs))
            .with_read_timeout(Duration::from_secs(download.read_timeout_secs))
            .with_retry(retry)
            .with_max_redirects(download.max_redirects)
            .with_clean_output_dir(self.install.clean_output_dir);

        if let Some(archiver) = &self.install.archiver {
            config = config.with_archiver(archiver.clone());
        }
        if let Some(marker) = &self.install.marker {
            config = config.with_marker(marker.clone());
        }
        config
    }
}

/// Directory holding the configuration file (`~/.modelpack`).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

/// Default extraction target under the user's data directory.
pub fn default_output_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(config_directory)
        .join("modelpack")
        .join("models")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp.path().join("absent.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.package.asset_prefix, "model-pack.7z.");
        assert_eq!(config.download.max_attempts, 8);
    }

    #[test]
    fn test_load_parses_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(
            &path,
            "[package]\n\
             repository = acme/brush-models\n\
             tag = v3\n\
             \n\
             [install]\n\
             output_dir = /opt/models\n\
             clean_output_dir = yes\n\
             marker = unet/model.safetensors\n\
             \n\
             [download]\n\
             timeout = 120\n\
             max_attempts = 5\n\
             initial_backoff_ms = 200\n\
             \n\
             [logging]\n\
             level = debug\n",
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.package.repository, "acme/brush-models");
        assert_eq!(config.package.tag, "v3");
        assert_eq!(config.install.output_dir, Some(PathBuf::from("/opt/models")));
        assert!(config.install.clean_output_dir);
        assert_eq!(config.download.timeout_secs, 120);
        assert_eq!(config.download.max_attempts, 5);
        assert_eq!(config.download.initial_backoff_ms, 200);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_ignores_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[package]\nmirror = somewhere\n[extra]\nkey = 1\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[download]\nmax_attempts = 50\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.package.repository = "acme/models".to_string();
        config.install.archiver = Some(PathBuf::from("/usr/bin/7zz"));
        config.download.max_redirects = 4;
        config.save_to(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[package]"));
        assert!(!contents.contains("access_token"));

        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let config = ConfigFile::default().with_overrides_from(|name| match name {
            ENV_OUTPUT_DIR => Some("/data/models".to_string()),
            ENV_GITHUB_TOKEN => Some("ghp_fallback".to_string()),
            _ => None,
        });
        assert_eq!(config.install.output_dir, Some(PathBuf::from("/data/models")));
        assert_eq!(config.package.access_token.as_deref(), Some("ghp_fallback"));

        let config = ConfigFile::default().with_overrides_from(|name| match name {
            ENV_TOKEN => Some("primary".to_string()),
            ENV_GITHUB_TOKEN => Some("fallback".to_string()),
            ENV_OUTPUT_DIR => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.package.access_token.as_deref(), Some("primary"));
        assert!(config.install.output_dir.is_none());
    }

    #[test]
    fn test_package_identifier() {
        let mut config = ConfigFile::default();
        assert!(matches!(
            config.package_identifier(),
            Err(ConfigError::MissingValue(_))
        ));

        config.package.repository = "acme/models".to_string();
        config.package.tag = "v2".to_string();
        config.package.access_token = Some("secret".to_string());
        let id = config.package_identifier().unwrap();
        assert_eq!(id.repository, "acme/models");
        assert_eq!(id.tag, ReleaseTag::Named("v2".to_string()));
        assert_eq!(id.access_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_to_manager_config() {
        let mut config = ConfigFile::default();
        config.download.max_attempts = 3;
        config.download.timeout_secs = 90;
        config.download.read_timeout_secs = 15;
        config.install.archiver = Some(PathBuf::from("7za"));
        config.install.clean_output_dir = true;

        let manager = config.to_manager_config();
        assert_eq!(manager.retry.max_attempts(), 3);
        assert_eq!(manager.timeout, Duration::from_secs(90));
        assert_eq!(manager.read_timeout, Duration::from_secs(15));
        assert_eq!(manager.archiver, Some(PathBuf::from("7za")));
        assert!(manager.clean_output_dir);
        assert!(manager.validate().is_ok());
    }

    #[test]
    fn test_output_dir_fallback() {
        let config = ConfigFile::default();
        assert!(config.output_dir().ends_with("modelpack/models"));
    }
}
