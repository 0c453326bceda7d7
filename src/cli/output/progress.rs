//! Progress display for experiment runs using indicatif.

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use crate::domain::models::{ExperimentEvent, ExperimentState};

const PROGRESS_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";
const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Create a standard progress bar.
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars(PROGRESS_CHARS),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Renders experiment events onto a progress bar.
pub struct ProgressRenderer {
    bar: ProgressBar,
}

impl ProgressRenderer {
    pub fn new(total_sessions: usize) -> Self {
        Self {
            bar: create_progress_bar(total_sessions as u64),
        }
    }

    /// Renderer that draws nothing; for tests and non-interactive output.
    pub fn hidden(total_sessions: usize) -> Self {
        Self {
            bar: ProgressBar::with_draw_target(
                Some(total_sessions as u64),
                ProgressDrawTarget::hidden(),
            ),
        }
    }

    /// Apply one event. Returns false once the run has ended.
    pub fn handle(&self, event: &ExperimentEvent) -> bool {
        match event {
            ExperimentEvent::Personas { persona_ids } => {
                self.bar
                    .set_message(format!("{} personas", persona_ids.len()));
                true
            }
            ExperimentEvent::Status(status) => {
                match status.state {
                    ExperimentState::Analyzing => self.bar.set_message("analyzing"),
                    ExperimentState::Running => self.bar.set_message("running"),
                    _ => {}
                }
                true
            }
            ExperimentEvent::Progress(status) => {
                self.bar.set_position(status.completed_sessions as u64);
                let eta = status
                    .estimated_seconds_remaining
                    .map(|s| format!(" (~{s}s left)"))
                    .unwrap_or_default();
                self.bar
                    .set_message(format!("{:.0}%{eta}", status.progress));
                true
            }
            ExperimentEvent::Complete(result) => {
                self.bar.finish_with_message(format!(
                    "{} sessions, {} failed",
                    result.sessions.len(),
                    result.failed_sessions()
                ));
                false
            }
            ExperimentEvent::Error { message } => {
                self.bar
                    .abandon_with_message(style(message.clone()).red().to_string());
                false
            }
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}
