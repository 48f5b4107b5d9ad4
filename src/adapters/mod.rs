//! Local collaborator implementations.
//!
//! These adapters back the `ies` binary: cases are directories, forecasts
//! and analysis updates are external commands, and hooks are shell commands.

pub mod fs_store;
pub mod process_analysis;
pub mod process_forecast;
pub mod shell_hooks;

pub use fs_store::FsCaseStore;
pub use process_analysis::ProcessAnalysisEngine;
pub use process_forecast::ProcessForecastExecutor;
pub use shell_hooks::ShellHookRunner;

use std::collections::HashMap;

use crate::context::RunContext;

/// Environment variables describing a run context to external commands.
pub(crate) fn context_env(context: &RunContext) -> HashMap<&'static str, String> {
    let mut env = HashMap::new();
    env.insert("IES_ITER", context.iteration().to_string());
    env.insert("IES_SOURCE_CASE", context.source_case().name.clone());
    env.insert(
        "IES_TARGET_CASE",
        context
            .target_case()
            .map(|case| case.name.clone())
            .unwrap_or_default(),
    );
    env.insert("IES_ACTIVE", context.active_mask().to_string());
    env.insert("IES_RERUN", if context.is_rerun() { "1" } else { "0" }.to_string());
    env
}
