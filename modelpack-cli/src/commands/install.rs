//! Install command - download, extract and verify the model pack.

use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use modelpack::manager::InstallResult;
use tracing::info;

use super::common::{
    absolute, apply_overrides, finish, require_identifier, set_cancel_handler, InstallOverrides,
};
use crate::error::CliError;
use crate::runner::CliRunner;
use crate::ui::{is_interactive, prompt_first_part, ProgressReporter};

/// Arguments for the install command.
pub struct InstallArgs {
    pub overrides: InstallOverrides,
    pub output: Option<PathBuf>,
    pub no_prompt: bool,
}

/// Run the install command.
pub fn run(args: InstallArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("install");

    let config = apply_overrides(runner.config(), &args.overrides)?;
    let id = require_identifier(&config)?;
    let output = absolute(&args.output.unwrap_or_else(|| config.output_dir()));
    let manager_config = config.to_manager_config();

    println!("modelpack v{}", modelpack::VERSION);
    println!("==================");
    println!();
    println!("Package: {}", id);
    println!("Output:  {}", output.display());
    println!("Staging: {}", manager_config.staging_dir.display());
    println!();
    println!("Press Ctrl+C to stop; the download resumes on the next run.");
    println!();

    let progress = Arc::new(ProgressReporter::new());
    let installer = runner.create_installer(manager_config, progress.clone())?;
    set_cancel_handler(&installer)?;

    let result = runner.block_on(installer.install(&id, &output));

    let result = match result {
        InstallResult::Failed(e) if e.is_not_found() && !args.no_prompt && is_interactive() => {
            progress.clear();
            eprintln!("{} {}", style("No archive parts found:").yellow().bold(), e);
            match prompt_first_part(&id.asset_prefix)? {
                Some(first_part) => {
                    info!(first_part = %first_part.display(), "installing from local archive");
                    runner.block_on(installer.install_from_local(&first_part, &output))
                }
                None => InstallResult::Failed(e),
            }
        }
        other => other,
    };

    match &result {
        InstallResult::Installed(_) => progress.finish("Installed"),
        _ => progress.clear(),
    }
    finish(result)
}
