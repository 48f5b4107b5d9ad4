//! Hook runner executing shell commands.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::collaborators::{HookRunner, HookRuntime};
use crate::context::RunContext;

use super::context_env;

/// Runs the commands registered for each hook runtime, in order.
///
/// A failing command is logged and the remaining commands still run.
#[derive(Debug, Clone, Default)]
pub struct ShellHookRunner {
    working_dir: PathBuf,
    hooks: HashMap<HookRuntime, Vec<String>>,
}

impl ShellHookRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            hooks: HashMap::new(),
        }
    }

    pub fn with_hook(mut self, runtime: HookRuntime, command: impl Into<String>) -> Self {
        self.hooks.entry(runtime).or_default().push(command.into());
        self
    }

    pub fn with_hooks<I, S>(mut self, runtime: HookRuntime, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hooks
            .entry(runtime)
            .or_default()
            .extend(commands.into_iter().map(Into::into));
        self
    }

    pub fn commands(&self, runtime: HookRuntime) -> &[String] {
        self.hooks.get(&runtime).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[async_trait]
impl HookRunner for ShellHookRunner {
    async fn run_hooks(&self, runtime: HookRuntime, context: &RunContext) {
        for command in self.commands(runtime) {
            let command = context.substitutions().substitute(command);
            let result = Command::new("sh")
                .arg("-c")
                .arg(&command)
                .current_dir(&self.working_dir)
                .envs(context_env(context))
                .env("IES_HOOK", runtime.as_str())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output()
                .await;

            match result {
                Ok(output) if output.status.success() => {
                    tracing::debug!(hook = %runtime, command = %command, "hook finished");
                }
                Ok(output) => tracing::warn!(
                    hook = %runtime,
                    command = %command,
                    status = %output.status,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "hook failed"
                ),
                Err(e) => tracing::warn!(
                    hook = %runtime,
                    command = %command,
                    "hook could not start: {}",
                    e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ActiveMask, CaseHandle, SubstitutionList};
    use tempfile::tempdir;

    fn context() -> RunContext {
        let mut subst = SubstitutionList::new();
        subst.insert("<TAG>", "tagged");
        RunContext::ensemble_smoother(
            CaseHandle::new("iter-1", 1),
            None,
            ActiveMask::all(1),
            "r",
            "j",
            subst,
            1,
        )
    }

    #[tokio::test]
    async fn test_hooks_run_in_order_with_substitutions() {
        let dir = tempdir().expect("tempdir");
        let hooks = ShellHookRunner::new(dir.path())
            .with_hook(HookRuntime::PreUpdate, "echo <TAG> >> log.txt")
            .with_hook(HookRuntime::PreUpdate, "echo $IES_HOOK $IES_ITER $IES_RERUN >> log.txt");

        hooks.run_hooks(HookRuntime::PreUpdate, &context()).await;
        hooks.run_hooks(HookRuntime::PostUpdate, &context()).await;

        let log = std::fs::read_to_string(dir.path().join("log.txt")).unwrap();
        assert_eq!(log, "tagged\npre_update 1 1\n");
    }

    #[tokio::test]
    async fn test_failing_hook_does_not_stop_the_rest() {
        let dir = tempdir().expect("tempdir");
        let hooks = ShellHookRunner::new(dir.path()).with_hooks(
            HookRuntime::PostSimulation,
            ["exit 1", "touch done"],
        );

        hooks.run_hooks(HookRuntime::PostSimulation, &context()).await;

        assert!(dir.path().join("done").exists());
    }
}
