//! Interactive prompts.

use std::path::PathBuf;

use console::Term;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;

use crate::error::CliError;

/// Whether prompts can be shown.
pub fn is_interactive() -> bool {
    Term::stderr().is_term()
}

/// Ask for the first archive part on disk. Empty input declines.
pub fn prompt_first_part(asset_prefix: &str) -> Result<Option<PathBuf>, CliError> {
    let input: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Path to a downloaded {}001 (leave empty to skip)",
            asset_prefix
        ))
        .allow_empty(true)
        .validate_with(|value: &String| -> Result<(), String> {
            let trimmed = value.trim();
            if trimmed.is_empty() || PathBuf::from(trimmed).is_file() {
                Ok(())
            } else {
                Err(format!("{} is not a file", trimmed))
            }
        })
        .interact_text()
        .map_err(|e| CliError::Config(format!("Failed to read input: {}", e)))?;

    let trimmed = input.trim();
    Ok((!trimmed.is_empty()).then(|| PathBuf::from(trimmed)))
}
