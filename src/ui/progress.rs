//! Progress bar following the run phases.
//!
//! Uses indicatif; the bar length is the phase count and the message shows
//! the current phase and step.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::collaborators::ProgressSink;

/// Phase progress rendered on stderr.
pub struct TerminalProgress {
    bar: ProgressBar,
    phase_message: Mutex<String>,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    /// Progress that tracks state without drawing anything.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden()))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(Self::create_style());
        Self {
            bar,
            phase_message: Mutex::new(String::new()),
        }
    }

    fn create_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.blue} [{elapsed_precise}] {bar:30.blue/white} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }

    /// Stop the spinner and leave the bar on screen.
    pub fn finish(&self) {
        self.bar.finish();
    }

    fn compose(&self, step: &str) -> String {
        let phase = self
            .phase_message
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default();
        if step.is_empty() || phase.is_empty() {
            format!("{}{}", phase, step)
        } else {
            format!("{} {}", phase, step)
        }
    }

    fn set_ticking(&self, indeterminate: bool) {
        if indeterminate {
            self.bar.enable_steady_tick(Duration::from_millis(100));
        } else {
            self.bar.disable_steady_tick();
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn set_phase(&self, index: u32, message: &str, indeterminate: bool) {
        if let Ok(mut phase) = self.phase_message.lock() {
            *phase = message.to_string();
        }
        self.bar.set_position(u64::from(index));
        self.bar.set_message(message.to_string());
        self.set_ticking(indeterminate);
        if self.bar.length() == Some(u64::from(index)) {
            self.bar.finish();
        }
    }

    fn set_phase_count(&self, count: u32) {
        self.bar.set_length(u64::from(count));
        self.bar.set_position(0);
    }

    fn set_phase_name(&self, message: &str, indeterminate: bool) {
        self.bar.set_message(self.compose(message));
        self.set_ticking(indeterminate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_follows_phases() {
        let progress = TerminalProgress::hidden();
        progress.set_phase_count(4);
        assert_eq!(progress.length(), Some(4));

        progress.set_phase(1, "Running iteration 1 of 3 simulation iterations...", false);
        progress.set_phase_name("Running forecast...", false);

        assert_eq!(progress.position(), 1);
        assert_eq!(
            progress.message(),
            "Running iteration 1 of 3 simulation iterations... Running forecast..."
        );
    }

    #[test]
    fn test_final_phase_finishes_bar() {
        let progress = TerminalProgress::hidden();
        progress.set_phase_count(2);
        progress.set_phase(2, "Simulations completed.", false);
        assert_eq!(progress.position(), 2);
        assert_eq!(progress.message(), "Simulations completed.");
    }
}
