//! Terminal output helpers.
//!
//! - `progress` - indicatif progress bars driven by installer events
//! - `prompt` - dialoguer prompts for the local-archive fallback

pub mod progress;
pub mod prompt;

pub use progress::ProgressReporter;
pub use prompt::{is_interactive, prompt_first_part};
