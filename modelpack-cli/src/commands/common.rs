//! Common helpers shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use modelpack::config::{format_size, ConfigFile, ConfigKey};
use modelpack::manager::{InstallResult, Installer};
use modelpack::package::{InstalledPackage, PackageIdentifier};

use crate::error::CliError;

/// Install settings that can be given on the command line.
#[derive(Debug, Clone, Default)]
pub struct InstallOverrides {
    pub repository: Option<String>,
    pub tag: Option<String>,
    pub staging_dir: Option<PathBuf>,
    pub archiver: Option<PathBuf>,
    pub marker: Option<PathBuf>,
    pub clean: bool,
}

/// Apply command-line settings on top of the configuration file.
///
/// CLI takes precedence over config.
pub fn apply_overrides(
    config: &ConfigFile,
    overrides: &InstallOverrides,
) -> Result<ConfigFile, CliError> {
    let mut config = config.clone();
    let settings: [(ConfigKey, Option<String>); 5] = [
        (ConfigKey::PackageRepository, overrides.repository.clone()),
        (ConfigKey::PackageTag, overrides.tag.clone()),
        (ConfigKey::InstallStagingDir, path_string(&overrides.staging_dir)),
        (ConfigKey::InstallArchiver, path_string(&overrides.archiver)),
        (ConfigKey::InstallMarker, path_string(&overrides.marker)),
    ];

    for (key, value) in settings {
        if let Some(value) = value {
            key.set(&mut config, &value)
                .map_err(|e| CliError::Config(e.to_string()))?;
        }
    }
    if overrides.clean {
        config.install.clean_output_dir = true;
    }
    Ok(config)
}

/// Package identifier from configuration.
pub fn require_identifier(config: &ConfigFile) -> Result<PackageIdentifier, CliError> {
    config.package_identifier().map_err(|_| {
        CliError::Config(
            "No repository specified. \
             Use --repo or set repository in config.ini [package] section."
                .to_string(),
        )
    })
}

fn path_string(path: &Option<PathBuf>) -> Option<String> {
    path.as_ref().map(|p| p.display().to_string())
}

/// Cancel `installer` on Ctrl+C.
pub fn set_cancel_handler(installer: &Arc<Installer>) -> Result<(), CliError> {
    let installer = Arc::downgrade(installer);
    ctrlc::set_handler(move || {
        if let Some(installer) = installer.upgrade() {
            if installer.cancel() {
                eprintln!();
                eprintln!("Cancelling, staged parts are kept for the next run...");
            }
        }
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))
}

/// Print the result summary of a successful run.
pub fn print_installed(package: &InstalledPackage) {
    println!();
    println!("{}", style("Installation complete").green().bold());
    println!("  Location:   {}", package.path().display());
    if let Some(id) = package.source() {
        println!("  Package:    {}", id);
    }
    if !package.parts.is_empty() {
        println!("  Parts:      {}", package.parts.len());
    }
    if package.bytes_downloaded > 0 {
        println!("  Downloaded: {}", format_size(package.bytes_downloaded));
    }
    println!("  Files:      {}", package.files_extracted);
}

/// Turn a terminal result into the command's outcome.
pub fn finish(result: InstallResult) -> Result<(), CliError> {
    match result {
        InstallResult::Installed(package) => {
            print_installed(&package);
            Ok(())
        }
        InstallResult::Cancelled => Err(CliError::Cancelled),
        InstallResult::Failed(e) => Err(e.into()),
    }
}

/// Make a path absolute against the current directory for display and logs.
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}
