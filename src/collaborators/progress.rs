//! Progress reporting sink.

/// Observability sink for phase progress. Nothing reported here affects
/// control flow.
pub trait ProgressSink: Send + Sync {
    /// Report the current phase and its message.
    fn set_phase(&self, index: u32, message: &str, indeterminate: bool);

    /// Report the total number of phases.
    fn set_phase_count(&self, count: u32);

    /// Report a sub-step name within the current phase.
    fn set_phase_name(&self, message: &str, indeterminate: bool);
}

/// Progress sink that writes every report to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn set_phase(&self, index: u32, message: &str, indeterminate: bool) {
        tracing::info!(phase = index, indeterminate, "{}", message);
    }

    fn set_phase_count(&self, count: u32) {
        tracing::debug!(phase_count = count, "phase count set");
    }

    fn set_phase_name(&self, message: &str, indeterminate: bool) {
        tracing::debug!(indeterminate, "{}", message);
    }
}
