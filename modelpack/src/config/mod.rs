//! User configuration for modelpack.
//!
//! Settings live in an INI file at `~/.modelpack/config.ini`:
//!
//! ```ini
//! [package]
//! repository = acme/brush-models
//! tag = latest
//! asset_prefix = model-pack.7z.
//!
//! [install]
//! output_dir = /opt/models/sd-turbo
//! clean_output_dir = false
//!
//! [download]
//! timeout = 3600
//! max_attempts = 8
//!
//! [logging]
//! level = info
//! ```
//!
//! Every setting is addressable as `section.key` through [`ConfigKey`], which
//! also owns value validation. Missing keys fall back to defaults.

mod file;
mod keys;
mod size;

pub use file::{
    config_directory, config_file_path, default_output_dir, ConfigError, ConfigFile,
    DownloadSettings, InstallSettings, LoggingSettings, PackageSettings, ENV_GITHUB_TOKEN,
    ENV_OUTPUT_DIR, ENV_TOKEN,
};
pub use keys::ConfigKey;
pub use size::format_size;
