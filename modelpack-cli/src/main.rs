//! modelpack CLI - Command-line interface
//!
//! Installs a split-archive model pack from a release, resuming interrupted
//! downloads across runs.

mod commands;
mod error;
mod runner;
mod ui;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use console::style;

use commands::common::InstallOverrides;
use commands::config::ConfigCommands;
use commands::extract::ExtractArgs;
use commands::install::InstallArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "modelpack")]
#[command(version, about = "Resumable installer for split-archive model packages")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Package selection and install settings shared by several commands.
#[derive(Debug, Args)]
struct PackageOptions {
    /// Repository in owner/name form (overrides package.repository)
    #[arg(long)]
    repo: Option<String>,

    /// Release tag, or "latest" (overrides package.tag)
    #[arg(long)]
    tag: Option<String>,

    /// Directory for downloaded parts (overrides install.staging_dir)
    #[arg(long)]
    staging_dir: Option<PathBuf>,

    /// 7-Zip compatible archiver binary (overrides install.archiver)
    #[arg(long)]
    archiver: Option<PathBuf>,

    /// File that must exist after extraction, relative to the output directory
    #[arg(long)]
    marker: Option<PathBuf>,

    /// Empty the output directory before extracting
    #[arg(long)]
    clean: bool,
}

impl From<PackageOptions> for InstallOverrides {
    fn from(options: PackageOptions) -> Self {
        Self {
            repository: options.repo,
            tag: options.tag,
            staging_dir: options.staging_dir,
            archiver: options.archiver,
            marker: options.marker,
            clean: options.clean,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Download, extract and verify the model pack
    Install {
        #[command(flatten)]
        package: PackageOptions,

        /// Extraction target (overrides install.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail instead of asking for local parts when none are published
        #[arg(long)]
        no_prompt: bool,
    },

    /// List the archive parts of a release without downloading them
    Resolve {
        #[command(flatten)]
        package: PackageOptions,
    },

    /// Extract archive parts that are already on disk
    Extract {
        /// First archive part (e.g., model-pack.7z.001)
        #[arg(long)]
        from: PathBuf,

        /// Extraction target (overrides install.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        package: PackageOptions,
    },

    /// View or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Install {
            package,
            output,
            no_prompt,
        } => commands::install::run(InstallArgs {
            overrides: package.into(),
            output,
            no_prompt,
        }),
        Commands::Resolve { package } => commands::resolve::run(package.into()),
        Commands::Extract {
            from,
            output,
            package,
        } => commands::extract::run(ExtractArgs {
            from,
            output,
            overrides: package.into(),
        }),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(e.exit_code());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_install() {
        let cli = Cli::try_parse_from([
            "modelpack",
            "install",
            "--repo",
            "acme/models",
            "--tag",
            "v2",
            "-o",
            "/opt/models",
            "--clean",
        ])
        .unwrap();

        match cli.command {
            Commands::Install {
                package, output, ..
            } => {
                assert_eq!(package.repo.as_deref(), Some("acme/models"));
                assert_eq!(package.tag.as_deref(), Some("v2"));
                assert!(package.clean);
                assert_eq!(output, Some(PathBuf::from("/opt/models")));
            }
            _ => panic!("expected install"),
        }
    }

    #[test]
    fn test_extract_requires_from() {
        assert!(Cli::try_parse_from(["modelpack", "extract"]).is_err());
        assert!(
            Cli::try_parse_from(["modelpack", "extract", "--from", "model-pack.7z.001"]).is_ok()
        );
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from(["modelpack", "config", "set", "package.tag", "v3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Set { .. }
            }
        ));
    }
}
