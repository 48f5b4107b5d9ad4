//! Forecast executor running one external command per realization.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::collaborators::ForecastExecutor;
use crate::context::RunContext;
use crate::error::{RunError, RunResult};

use super::context_env;

/// Runs the forecast job for every active realization with a bounded
/// worker pool.
#[derive(Debug, Clone)]
pub struct ProcessForecastExecutor {
    working_dir: PathBuf,
    job: String,
    max_running: usize,
    job_timeout: Option<Duration>,
}

/// What a single realization job needs, detached from the context.
struct RealizationJob {
    realization: usize,
    command: String,
    runpath: PathBuf,
    env: Vec<(String, String)>,
}

impl ProcessForecastExecutor {
    /// Executor running `job` (after placeholder substitution) inside each
    /// realization's run path, resolved relative to `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>, job: impl Into<String>) -> Self {
        Self {
            working_dir: working_dir.into(),
            job: job.into(),
            max_running: 4,
            job_timeout: None,
        }
    }

    /// Limit how many realizations run at once (at least one).
    pub fn with_max_running(mut self, max_running: usize) -> Self {
        self.max_running = max_running.max(1);
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    fn runpath(&self, context: &RunContext, realization: usize) -> PathBuf {
        self.working_dir.join(context.runpath(realization))
    }

    fn jobs(&self, context: &RunContext) -> Vec<RealizationJob> {
        let base_env = context_env(context);
        context
            .active_mask()
            .active_indices()
            .into_iter()
            .map(|realization| {
                let mut env: Vec<(String, String)> = base_env
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect();
                env.push(("IES_IENS".to_string(), realization.to_string()));
                env.push(("IES_JOBNAME".to_string(), context.jobname(realization)));
                RealizationJob {
                    realization,
                    command: context.render(&self.job, realization),
                    runpath: self.runpath(context, realization),
                    env,
                }
            })
            .collect()
    }
}

async fn run_job(job: RealizationJob, timeout: Option<Duration>) -> bool {
    let mut command = Command::new("sh");
    command
        .arg("-c")
        .arg(&job.command)
        .current_dir(&job.runpath)
        .envs(job.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = command.output();
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, output).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    realization = job.realization,
                    timeout_secs = limit.as_secs(),
                    "realization timed out"
                );
                return false;
            }
        },
        None => output.await,
    };

    match result {
        Ok(output) if output.status.success() => {
            tracing::debug!(realization = job.realization, "realization succeeded");
            true
        }
        Ok(output) => {
            tracing::warn!(
                realization = job.realization,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "realization failed"
            );
            false
        }
        Err(e) => {
            tracing::warn!(realization = job.realization, "failed to start job: {}", e);
            false
        }
    }
}

#[async_trait]
impl ForecastExecutor for ProcessForecastExecutor {
    async fn create_runpaths(&self, context: &RunContext) -> RunResult<()> {
        for realization in context.active_mask().active_indices() {
            let path = self.runpath(context, realization);
            tokio::fs::create_dir_all(&path).await.map_err(|e| {
                RunError::Forecast(format!(
                    "cannot create run path '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    async fn run(&self, context: &RunContext) -> RunResult<usize> {
        let semaphore = Arc::new(Semaphore::new(self.max_running));
        let mut handles = Vec::new();

        for job in self.jobs(context) {
            let semaphore = semaphore.clone();
            let timeout = self.job_timeout;
            handles.push(tokio::spawn(async move {
                // Hold the permit until the job finishes
                let _permit = semaphore.acquire_owned().await.ok()?;
                Some(run_job(job, timeout).await)
            }));
        }

        let results = futures::future::join_all(handles).await;
        let successful = results
            .into_iter()
            .filter(|result| matches!(result, Ok(Some(true))))
            .count();

        tracing::info!(
            iteration = context.iteration(),
            successful,
            active = context.active_mask().count_active(),
            "forecast finished"
        );
        Ok(successful)
    }
}
