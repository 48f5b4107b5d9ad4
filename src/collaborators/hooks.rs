//! Workflow hook extension points.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;

/// Fixed points in the control flow where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookRuntime {
    PreSimulation,
    PostSimulation,
    PreUpdate,
    PostUpdate,
}

impl HookRuntime {
    pub const ALL: [HookRuntime; 4] = [
        HookRuntime::PreSimulation,
        HookRuntime::PostSimulation,
        HookRuntime::PreUpdate,
        HookRuntime::PostUpdate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookRuntime::PreSimulation => "pre_simulation",
            HookRuntime::PostSimulation => "post_simulation",
            HookRuntime::PreUpdate => "pre_update",
            HookRuntime::PostUpdate => "post_update",
        }
    }
}

impl fmt::Display for HookRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs the hooks registered for a runtime.
///
/// Hooks are fire-and-forget: nothing they return reaches the controller.
#[async_trait]
pub trait HookRunner: Send + Sync {
    async fn run_hooks(&self, runtime: HookRuntime, context: &RunContext);
}

/// Hook runner with nothing registered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHookRunner;

#[async_trait]
impl HookRunner for NoopHookRunner {
    async fn run_hooks(&self, runtime: HookRuntime, context: &RunContext) {
        tracing::trace!(hook = %runtime, iteration = context.iteration(), "no hooks registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_runtime_serializes_snake_case() {
        let json = serde_json::to_string(&HookRuntime::PreSimulation).unwrap();
        assert_eq!(json, "\"pre_simulation\"");
        for runtime in HookRuntime::ALL {
            assert_eq!(
                serde_json::to_string(&runtime).unwrap(),
                format!("\"{}\"", runtime)
            );
        }
    }
}
