//! Analysis engine delegating updates to external commands.
//!
//! Each registered module maps to a command. The command receives the run
//! context through `IES_*` environment variables. A non-zero exit status is
//! an explicit analysis failure. On success the command reports the engine's
//! new iteration counter by printing a line `ITER=<n>`; without such a line
//! the counter stays where it was and the update counts as non-advancing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;

use crate::collaborators::AnalysisEngine;
use crate::context::RunContext;
use crate::error::{RunError, RunResult};

use super::context_env;

/// Prefix of the stdout line carrying the updated iteration counter.
const ITER_MARKER: &str = "ITER=";

#[derive(Debug)]
pub struct ProcessAnalysisEngine {
    working_dir: PathBuf,
    modules: HashMap<String, String>,
    selected: Mutex<Option<String>>,
    case_format: Mutex<Option<String>>,
    counter: AtomicU32,
}

impl ProcessAnalysisEngine {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            modules: HashMap::new(),
            selected: Mutex::new(None),
            case_format: Mutex::new(None),
            counter: AtomicU32::new(0),
        }
    }

    /// Register a module and the command performing its update.
    pub fn with_module(mut self, name: impl Into<String>, command: impl Into<String>) -> Self {
        self.modules.insert(name.into(), command.into());
        self
    }

    pub fn selected_module(&self) -> Option<String> {
        self.selected.lock().ok().and_then(|guard| guard.clone())
    }

    fn selected_command(&self) -> RunResult<(String, String)> {
        let name = self
            .selected_module()
            .ok_or_else(|| RunError::Analysis("no analysis module selected".to_string()))?;
        let command = self
            .modules
            .get(&name)
            .cloned()
            .ok_or_else(|| RunError::Analysis(format!("module '{}' is not registered", name)))?;
        Ok((name, command))
    }
}

/// Last `ITER=<n>` value printed by an update command.
fn parse_counter(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix(ITER_MARKER))
        .filter_map(|value| value.trim().parse().ok())
        .last()
}

#[async_trait]
impl AnalysisEngine for ProcessAnalysisEngine {
    async fn select_module(&self, name: &str) -> bool {
        if !self.modules.contains_key(name) {
            tracing::error!(module = name, "analysis module is not registered");
            return false;
        }
        match self.selected.lock() {
            Ok(mut selected) => {
                *selected = Some(name.to_string());
                true
            }
            Err(_) => false,
        }
    }

    async fn set_case_format(&self, format: &str) -> RunResult<()> {
        let mut case_format = self
            .case_format
            .lock()
            .map_err(|_| RunError::Analysis("case format lock poisoned".to_string()))?;
        *case_format = Some(format.to_string());
        Ok(())
    }

    async fn iteration_counter(&self) -> RunResult<u32> {
        Ok(self.counter.load(Ordering::SeqCst))
    }

    async fn update(&self, context: &RunContext) -> RunResult<bool> {
        let (module, command) = self.selected_command()?;
        let case_format = self
            .case_format
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .unwrap_or_default();

        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .current_dir(&self.working_dir)
            .envs(context_env(context))
            .env("IES_MODULE", &module)
            .env("IES_CASE_FORMAT", &case_format)
            .env("IES_ITER_COUNTER", self.counter.load(Ordering::SeqCst).to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| RunError::Analysis(format!("failed to run '{}': {}", command, e)))?;

        if !output.status.success() {
            tracing::error!(
                module = %module,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "analysis update failed"
            );
            return Ok(false);
        }

        match parse_counter(&String::from_utf8_lossy(&output.stdout)) {
            Some(counter) => {
                self.counter.store(counter, Ordering::SeqCst);
                tracing::debug!(module = %module, counter, "analysis counter updated");
            }
            None => tracing::debug!(module = %module, "update reported no iteration counter"),
        }
        Ok(true)
    }
}
