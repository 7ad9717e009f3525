//! Extract command - install from archive parts already on disk.

use std::path::PathBuf;
use std::sync::Arc;

use modelpack::manager::InstallResult;

use super::common::{absolute, apply_overrides, finish, set_cancel_handler, InstallOverrides};
use crate::error::CliError;
use crate::runner::CliRunner;
use crate::ui::ProgressReporter;

/// Arguments for the extract command.
pub struct ExtractArgs {
    pub from: PathBuf,
    pub output: Option<PathBuf>,
    pub overrides: InstallOverrides,
}

/// Run the extract command.
pub fn run(args: ExtractArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("extract");

    if !args.from.is_file() {
        return Err(CliError::Config(format!(
            "Archive part not found: {}",
            args.from.display()
        )));
    }

    let config = apply_overrides(runner.config(), &args.overrides)?;
    let first_part = absolute(&args.from);
    let output = absolute(&args.output.unwrap_or_else(|| config.output_dir()));

    println!("Extracting {}", first_part.display());
    println!("        to {}", output.display());
    println!();

    let progress = Arc::new(ProgressReporter::new());
    let installer = runner.create_installer(config.to_manager_config(), progress.clone())?;
    set_cancel_handler(&installer)?;

    let result = runner.block_on(installer.install_from_local(&first_part, &output));
    match &result {
        InstallResult::Installed(_) => progress.finish("Extracted"),
        _ => progress.clear(),
    }
    finish(result)
}
