//! Terminal progress display for install runs.

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use modelpack::manager::{InstallObserver, InstallPhase, LogEvent, LogLevel, ProgressEvent};

const OVERALL_TEMPLATE: &str = "[{bar:50.cyan/blue}] {pos:>3}%  {msg}";
const PART_TEMPLATE: &str = "   [{bar:50.green/blue}] {bytes}/{total_bytes}  {msg}";

/// Two-line progress display: overall completion and the current part.
pub struct ProgressReporter {
    multi: MultiProgress,
    overall: ProgressBar,
    part: ProgressBar,
}

impl ProgressReporter {
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let overall = multi.add(ProgressBar::new(100));
        overall.set_style(bar_style(OVERALL_TEMPLATE));

        let part = multi.add(ProgressBar::new(0));
        part.set_style(bar_style(PART_TEMPLATE));

        Self {
            multi,
            overall,
            part,
        }
    }

    /// Remove the bars, leaving the final overall line.
    pub fn finish(&self, message: impl Into<String>) {
        self.part.finish_and_clear();
        self.overall.finish_with_message(message.into());
    }

    /// Remove both bars.
    pub fn clear(&self) {
        self.part.finish_and_clear();
        self.overall.finish_and_clear();
    }

    fn phase_message(phase: InstallPhase) -> &'static str {
        match phase {
            InstallPhase::Resolving => "Looking up release assets",
            InstallPhase::Downloading => "Downloading",
            InstallPhase::Extracting => "Extracting archive",
            InstallPhase::Verifying => "Verifying installation",
            InstallPhase::Done => "Done",
            InstallPhase::Failed => "Failed",
            InstallPhase::Cancelled => "Cancelled",
            InstallPhase::Idle => "",
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallObserver for ProgressReporter {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Some(percent) = event.overall_percent() {
            self.overall.set_position(percent.floor() as u64);
        }

        match (&event.part, &event.overall) {
            (Some(part), Some(overall)) => {
                if let Some(total) = part.bytes_total {
                    self.part.set_length(total);
                }
                self.part.set_position(part.bytes_received);
                self.part.set_message(part.part_name.clone());
                self.overall.set_message(format!(
                    "Part {}/{}",
                    part.part_index + 1,
                    overall.parts_total
                ));
            }
            _ => {
                if event.phase != InstallPhase::Downloading {
                    self.part.set_position(0);
                    self.part.set_length(0);
                    self.part.set_message("");
                }
                self.overall.set_message(Self::phase_message(event.phase));
                if event.phase == InstallPhase::Done {
                    self.overall.set_position(100);
                }
            }
        }
    }

    fn on_log(&self, event: &LogEvent) {
        let line = match event.level {
            LogLevel::Info => return,
            LogLevel::Warn => format!("{} {}", style("warning:").yellow().bold(), event.message),
            LogLevel::Error => format!("{} {}", style("error:").red().bold(), event.message),
        };
        if self.multi.is_hidden() || self.multi.println(&line).is_err() {
            eprintln!("{}", line);
        }
    }
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}
