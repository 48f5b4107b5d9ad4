//! Analysis-and-retry state machine.
//!
//! Success of an analysis update is derived from the engine's iteration
//! counter: capture it before the update, capture it after, compare. The
//! [`RetryTracker`] turns the resulting [`AnalysisOutcome`] into a
//! [`Transition`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// States visited by the controller during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationState {
    RunningForecast,
    Analyzing,
    Advanced,
    Retrying,
    Done,
    Failed,
}

impl IterationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IterationState::RunningForecast => "running_forecast",
            IterationState::Analyzing => "analyzing",
            IterationState::Advanced => "advanced",
            IterationState::Retrying => "retrying",
            IterationState::Done => "done",
            IterationState::Failed => "failed",
        }
    }

    /// Whether the run ends in this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IterationState::Done | IterationState::Failed)
    }
}

impl fmt::Display for IterationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one analysis update as seen through the iteration counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// The counter grew across the update.
    Advanced,
    /// The counter stayed put (or went backwards).
    NotAdvanced,
}

/// Compare the counter captured before and after an update.
pub fn classify(pre_count: u32, post_count: u32) -> AnalysisOutcome {
    if post_count > pre_count {
        AnalysisOutcome::Advanced
    } else {
        AnalysisOutcome::NotAdvanced
    }
}

/// Decision taken after an analysis round has been followed by its forecast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The run moved on to `iteration`.
    Advance { iteration: u32 },
    /// `iteration` is repeated; `attempt` consecutive non-advances so far.
    Retry { iteration: u32, attempt: u32 },
    /// The retry budget ran out at `iteration`.
    Fail { iteration: u32, retries: u32 },
}

impl Transition {
    /// State the controller enters on this transition.
    pub fn state(&self) -> IterationState {
        match self {
            Transition::Advance { .. } => IterationState::Advanced,
            Transition::Retry { .. } => IterationState::Retrying,
            Transition::Fail { .. } => IterationState::Failed,
        }
    }

    pub fn iteration(&self) -> u32 {
        match self {
            Transition::Advance { iteration }
            | Transition::Retry { iteration, .. }
            | Transition::Fail { iteration, .. } => *iteration,
        }
    }
}

/// Consecutive non-advancing updates for the current analysis iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryTracker {
    max_retries: u32,
    retries: u32,
}

impl RetryTracker {
    /// Tracker allowing `max_retries` consecutive non-advances; the one that
    /// reaches the budget is fatal.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            retries: 0,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Record the outcome of a completed round at `iteration`.
    ///
    /// An advance resets the count to zero; a non-advance increments it and
    /// fails once it reaches the budget.
    pub fn record(&mut self, outcome: AnalysisOutcome, iteration: u32) -> Transition {
        match outcome {
            AnalysisOutcome::Advanced => {
                self.retries = 0;
                Transition::Advance { iteration }
            }
            AnalysisOutcome::NotAdvanced => {
                self.retries += 1;
                if self.retries >= self.max_retries {
                    Transition::Fail {
                        iteration,
                        retries: self.retries,
                    }
                } else {
                    Transition::Retry {
                        iteration,
                        attempt: self.retries,
                    }
                }
            }
        }
    }
}
