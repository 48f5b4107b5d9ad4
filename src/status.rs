//! Run status bookkeeping.
//!
//! A [`RunStatus`] is created with the controller and updated as the run
//! progresses. It lives only as long as the process; `save_to_path` writes a
//! snapshot for inspection but nothing reads it back into a run.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::iteration::IterationState;

/// Snapshot of a smoother run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Name of the run model.
    pub model_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Whether the run has ended, successfully or not.
    pub finished: bool,
    pub failed: bool,
    pub fail_message: Option<String>,
    /// Error category of a failed run.
    pub error_kind: Option<String>,
    /// Last reported phase index.
    pub phase: u32,
    pub phase_count: u32,
    /// Last reported phase or phase-name message.
    pub phase_message: String,
    /// Iteration reached by the last completed analysis round.
    pub last_completed_iteration: Option<u32>,
    /// Consecutive non-advancing updates at the time of the last report.
    pub retries: u32,
    /// Every state the controller entered, in order.
    pub states: Vec<IterationState>,
}

impl RunStatus {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            started_at: None,
            finished_at: None,
            finished: false,
            failed: false,
            fail_message: None,
            error_kind: None,
            phase: 0,
            phase_count: 0,
            phase_message: String::new(),
            last_completed_iteration: None,
            retries: 0,
            states: Vec::new(),
        }
    }

    /// Reset the bookkeeping and stamp the start time.
    pub fn start(&mut self) {
        let name = std::mem::take(&mut self.model_name);
        *self = Self::new(name);
        self.started_at = Some(Utc::now());
    }

    pub fn record_state(&mut self, state: IterationState) {
        self.states.push(state);
    }

    pub fn record_phase(&mut self, phase: u32, phase_count: u32, message: &str) {
        self.phase = phase;
        self.phase_count = phase_count;
        self.phase_message = message.to_string();
    }

    pub fn complete(&mut self) {
        self.finished = true;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: &RunError) {
        self.failed = true;
        self.fail_message = Some(error.to_string());
        self.error_kind = Some(error.kind().as_str().to_string());
        self.complete();
    }

    /// The state the run ended in, if it has ended.
    pub fn terminal_state(&self) -> Option<IterationState> {
        self.states.last().copied().filter(|s| s.is_terminal())
    }

    /// Wall-clock duration of the run, once both ends are known.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Write the status as pretty JSON.
    pub fn save_to_path(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_start_resets_previous_run() {
        let mut status = RunStatus::new("Iterated Ensemble Smoother");
        status.record_state(IterationState::Failed);
        status.failed = true;

        status.start();

        assert_eq!(status.model_name, "Iterated Ensemble Smoother");
        assert!(status.states.is_empty());
        assert!(!status.failed);
        assert!(status.started_at.is_some());
    }

    #[test]
    fn test_fail_records_message_and_kind() {
        let mut status = RunStatus::new("m");
        status.start();
        status.fail(&RunError::RetriesExhausted {
            retries: 4,
            iteration: 2,
        });

        assert!(status.finished);
        assert!(status.failed);
        assert_eq!(status.error_kind.as_deref(), Some("retry_exhaustion"));
        assert!(status.fail_message.as_ref().unwrap().contains("4 retries"));
        assert!(status.duration().is_some());
    }

    #[test]
    fn test_terminal_state_only_for_terminal_states() {
        let mut status = RunStatus::new("m");
        status.record_state(IterationState::Advanced);
        assert_eq!(status.terminal_state(), None);
        status.record_state(IterationState::Done);
        assert_eq!(status.terminal_state(), Some(IterationState::Done));
    }

    #[test]
    fn test_save_to_path_writes_json() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("out/status.json");
        let mut status = RunStatus::new("m");
        status.record_state(IterationState::RunningForecast);

        status.save_to_path(&file).expect("save status");

        let loaded: RunStatus =
            serde_json::from_slice(&std::fs::read(&file).expect("read")).expect("parse");
        assert_eq!(loaded, status);
    }
}
