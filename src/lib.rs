//! Iterated ensemble smoother run controller.
//!
//! Drives a sequence of forecast and analysis rounds over an ensemble of
//! realizations. Each analysis either advances the iteration counter or is
//! retried against the same source case, up to a per-iteration limit. The
//! storage, simulation and analysis systems are reached through the traits in
//! [`collaborators`]; [`adapters`] has filesystem and process backed
//! implementations used by the `ies` binary.

pub mod adapters;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod error;
pub mod iteration;
pub mod logging;
pub mod runner;
pub mod status;
pub mod ui;

pub use error::{RunError, RunResult};
pub use runner::{Collaborators, ControllerSettings, IteratedSmoother, RunArguments};
