//! Phase bookkeeping for externally reported progress.

use std::sync::Arc;

use crate::collaborators::ProgressSink;

/// Tracks the reported phase and forwards reports to a [`ProgressSink`].
///
/// The phase index never moves backwards within a run: a report with a lower
/// index keeps the current one.
pub struct PhaseTracker {
    sink: Arc<dyn ProgressSink>,
    phase_index: u32,
    phase_count: u32,
    last_message: String,
}

impl PhaseTracker {
    pub fn new(sink: Arc<dyn ProgressSink>, phase_count: u32) -> Self {
        sink.set_phase_count(phase_count);
        Self {
            sink,
            phase_index: 0,
            phase_count,
            last_message: String::new(),
        }
    }

    pub fn phase_index(&self) -> u32 {
        self.phase_index
    }

    pub fn phase_count(&self) -> u32 {
        self.phase_count
    }

    /// Last phase or phase-name message reported.
    pub fn last_message(&self) -> &str {
        &self.last_message
    }

    /// Fix the total number of phases; this also restarts the index.
    pub fn set_phase_count(&mut self, count: u32) {
        self.phase_count = count;
        self.phase_index = 0;
        self.sink.set_phase_count(count);
    }

    pub fn set_phase(&mut self, index: u32, message: &str, indeterminate: bool) {
        if index < self.phase_index {
            tracing::debug!(
                requested = index,
                current = self.phase_index,
                "ignoring backwards phase report"
            );
        }
        self.phase_index = self.phase_index.max(index);
        self.last_message = message.to_string();
        self.sink.set_phase(self.phase_index, message, indeterminate);
    }

    pub fn set_phase_name(&mut self, message: &str, indeterminate: bool) {
        self.last_message = message.to_string();
        self.sink.set_phase_name(message, indeterminate);
    }
}
