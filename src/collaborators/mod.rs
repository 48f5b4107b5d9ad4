//! Collaborator traits for the run controller.
//!
//! The controller never runs realizations, performs analysis updates or
//! stores ensemble state itself. It drives the collaborators defined here,
//! which lets tests substitute in-memory doubles and lets the binary plug in
//! the process-backed adapters.

pub mod hooks;
pub mod progress;

pub use hooks::{HookRunner, HookRuntime, NoopHookRunner};
pub use progress::{ProgressSink, TracingProgress};

use async_trait::async_trait;

use crate::context::{CaseHandle, RunContext};
use crate::error::RunResult;

/// Persistent, iteration-indexed ensemble-state storage.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Resolve a naming template and iteration to a case, creating it if needed.
    async fn resolve(&self, template: &str, iteration: u32) -> RunResult<CaseHandle>;

    /// Repoint the store's current case.
    ///
    /// The controller calls this exactly once per advancing analysis update.
    async fn switch_current(&self, case: &CaseHandle) -> RunResult<()>;
}

/// Executes the active realizations of a run context.
#[async_trait]
pub trait ForecastExecutor: Send + Sync {
    /// Prepare run paths for the active realizations.
    async fn create_runpaths(&self, _context: &RunContext) -> RunResult<()> {
        Ok(())
    }

    /// Run the active realizations and return how many completed successfully.
    async fn run(&self, context: &RunContext) -> RunResult<usize>;
}

/// Statistical update engine.
///
/// The only success signal the controller trusts is the iteration counter:
/// an update advanced the run if the counter grew across the call.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Activate an analysis module. Returns false if it cannot be loaded.
    async fn select_module(&self, name: &str) -> bool;

    /// Tell the engine which case naming template the run writes into.
    async fn set_case_format(&self, _format: &str) -> RunResult<()> {
        Ok(())
    }

    /// Current value of the engine's monotonic iteration counter.
    async fn iteration_counter(&self) -> RunResult<u32>;

    /// Run one update step. `Ok(false)` is an explicit analysis failure.
    async fn update(&self, context: &RunContext) -> RunResult<bool>;
}
