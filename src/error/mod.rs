//! Error handling for the iterated smoother.
//!
//! Every fatal condition of a run surfaces as a [`RunError`]. Non-advancing
//! analysis updates are not errors on their own; they only become
//! [`RunError::RetriesExhausted`] once the retry budget for an iteration is
//! spent.

pub mod classification;

pub use classification::ErrorKind;

use std::io;

use thiserror::Error;

/// Fatal errors raised by the run controller and its collaborators.
#[derive(Error, Debug)]
pub enum RunError {
    /// The requested analysis module could not be activated.
    #[error("Unable to load analysis module '{module}'!")]
    ModuleLoad { module: String },

    /// The run configuration is not usable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Fewer realizations completed than the run requires.
    #[error(
        "Too many simulations have failed! {successful} realization(s) succeeded, \
         {required} required. You can add/adjust MIN_REALIZATIONS to allow failures \
         in your simulations."
    )]
    InsufficientRealizations { successful: usize, required: usize },

    /// The analysis engine reported an explicit failure.
    #[error("Analysis of simulation failed! (iteration {iteration})")]
    AnalysisFailed { iteration: u32 },

    /// Consecutive non-advancing analysis updates used up the retry budget.
    #[error(
        "Iterated Ensemble Smoother stopped: maximum number of iteration retries \
         ({retries} retries) reached for iteration {iteration}"
    )]
    RetriesExhausted { retries: u32, iteration: u32 },

    /// The case store failed to resolve or switch a case.
    #[error("Case store error: {0}")]
    CaseStore(String),

    /// The forecast executor failed outside of the success count.
    #[error("Forecast error: {0}")]
    Forecast(String),

    /// The analysis engine failed outside of its success signal.
    #[error("Analysis engine error: {0}")]
    Analysis(String),

    /// IO error from a local collaborator.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type used throughout the controller and its collaborators.
pub type RunResult<T> = Result<T, RunError>;
