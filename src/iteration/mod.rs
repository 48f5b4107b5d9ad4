//! Iteration control for the smoother run.
//!
//! This module holds the bookkeeping the controller needs between analysis
//! rounds: the retry state machine and the externally reported phase
//! progress.

pub mod phase;
pub mod state;

pub use phase::PhaseTracker;
pub use state::{classify, AnalysisOutcome, IterationState, RetryTracker, Transition};
