// Iterated ensemble smoother run controller
// Sequences forecast, analysis and retry decisions until the configured
// number of analysis iterations is reached or the retry budget runs out.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::collaborators::{
    AnalysisEngine, CaseStore, ForecastExecutor, HookRunner, HookRuntime, NoopHookRunner,
    ProgressSink, TracingProgress,
};
use crate::context::{ActiveMask, RunContext, RunContextFactory, SubstitutionList};
use crate::error::{RunError, RunResult};
use crate::iteration::{
    classify, AnalysisOutcome, IterationState, PhaseTracker, RetryTracker, Transition,
};
use crate::status::RunStatus;

/// Name reported for this run model.
pub const MODEL_NAME: &str = "Iterated Ensemble Smoother";

/// Phase count reported before a run has started.
const INITIAL_PHASE_COUNT: u32 = 2;

/// Run-wide settings of the controller.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Number of analysis iterations to perform.
    pub num_iterations: u32,
    /// Consecutive non-advancing updates allowed per iteration; reaching it is fatal.
    pub max_retries_per_iteration: u32,
    /// Successful realizations required per forecast (0 = every active one).
    pub min_realizations: usize,
    pub runpath_template: String,
    pub jobname_template: String,
    pub substitutions: SubstitutionList,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            num_iterations: 4,
            max_retries_per_iteration: 4,
            min_realizations: 0,
            runpath_template: "simulations/realization-<IENS>/iter-<ITER>".to_string(),
            jobname_template: "SIM_<IENS>".to_string(),
            substitutions: SubstitutionList::new(),
        }
    }
}

impl ControllerSettings {
    /// Reject settings the controller cannot run with.
    ///
    /// A run with zero analysis iterations is refused rather than treated as
    /// an immediate success.
    pub fn validate(&self) -> RunResult<()> {
        if self.num_iterations == 0 {
            return Err(RunError::InvalidConfiguration(
                "number of analysis iterations must be at least 1".to_string(),
            ));
        }
        if self.num_iterations.checked_add(1).is_none() {
            return Err(RunError::InvalidConfiguration(format!(
                "number of analysis iterations must be below {}",
                u32::MAX
            )));
        }
        if self.max_retries_per_iteration == 0 {
            return Err(RunError::InvalidConfiguration(
                "number of retries per iteration must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Successful realizations required for a forecast over `active` realizations.
    ///
    /// Never more than `active`; 0 means all of them.
    pub fn required_realizations(&self, active: usize) -> usize {
        if self.min_realizations == 0 {
            active
        } else {
            self.min_realizations.min(active)
        }
    }
}

/// Inputs of one `run_simulations` call.
#[derive(Debug, Clone)]
pub struct RunArguments {
    pub analysis_module: String,
    /// Case naming template with an iteration placeholder, e.g. `iter-%d`.
    pub target_case_format: String,
    pub active_realizations: ActiveMask,
}

/// The external collaborators a run drives.
#[derive(Clone)]
pub struct Collaborators {
    pub case_store: Arc<dyn CaseStore>,
    pub forecast: Arc<dyn ForecastExecutor>,
    pub analysis: Arc<dyn AnalysisEngine>,
    pub hooks: Arc<dyn HookRunner>,
    pub progress: Arc<dyn ProgressSink>,
}

impl Collaborators {
    /// Collaborators with no hooks and progress reported to the log.
    pub fn new(
        case_store: Arc<dyn CaseStore>,
        forecast: Arc<dyn ForecastExecutor>,
        analysis: Arc<dyn AnalysisEngine>,
    ) -> Self {
        Self {
            case_store,
            forecast,
            analysis,
            hooks: Arc::new(NoopHookRunner),
            progress: Arc::new(TracingProgress),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn HookRunner>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }
}

/// Iterated ensemble smoother controller.
///
/// Each step runs to completion before the next begins: a forecast never
/// overlaps an analysis update, and iterations are never pipelined.
pub struct IteratedSmoother {
    settings: ControllerSettings,
    collaborators: Collaborators,
    phases: PhaseTracker,
    status: RunStatus,
}

impl IteratedSmoother {
    pub fn new(settings: ControllerSettings, collaborators: Collaborators) -> Self {
        let phases = PhaseTracker::new(collaborators.progress.clone(), INITIAL_PHASE_COUNT);
        Self {
            settings,
            collaborators,
            phases,
            status: RunStatus::new(MODEL_NAME),
        }
    }

    pub fn name(&self) -> &'static str {
        MODEL_NAME
    }

    /// Runs cannot be restarted from an intermediate iteration.
    pub fn supports_restart(&self) -> bool {
        false
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Status of the current or last run.
    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn phase_count(&self) -> u32 {
        self.phases.phase_count()
    }

    /// Run the smoother to completion.
    ///
    /// Returns the final run context on success. Every failure is fatal and
    /// unwinds the whole run; the status keeps the last reported phase.
    pub async fn run_simulations(&mut self, arguments: RunArguments) -> RunResult<RunContext> {
        self.status.start();
        info!(
            model = MODEL_NAME,
            module = %arguments.analysis_module,
            target_case = %arguments.target_case_format,
            realizations = %arguments.active_realizations,
            "starting run"
        );

        let span = info_span!("run_simulations", module = %arguments.analysis_module);
        let result = self.execute(&arguments).instrument(span).await;

        self.status.record_phase(
            self.phases.phase_index(),
            self.phases.phase_count(),
            self.phases.last_message(),
        );
        match &result {
            Ok(context) => {
                info!(iteration = context.iteration(), "run completed");
                self.status.complete();
            }
            Err(err) => {
                warn!(kind = %err.kind(), "run failed: {}", err);
                if self.status.terminal_state() != Some(IterationState::Failed) {
                    self.enter(IterationState::Failed);
                }
                self.status.fail(err);
            }
        }
        result
    }

    async fn execute(&mut self, arguments: &RunArguments) -> RunResult<RunContext> {
        self.settings.validate()?;
        if arguments.active_realizations.count_active() == 0 {
            return Err(RunError::InvalidConfiguration(
                "no active realizations selected".to_string(),
            ));
        }

        let target_iterations = self.settings.num_iterations;
        let phase_count = target_iterations.checked_add(1).ok_or_else(|| {
            RunError::InvalidConfiguration("too many analysis iterations".to_string())
        })?;
        self.phases.set_phase_count(phase_count);

        self.select_analysis_module(&arguments.analysis_module).await?;

        let factory = RunContextFactory::new(
            arguments.target_case_format.clone(),
            self.settings.runpath_template.clone(),
            self.settings.jobname_template.clone(),
            self.settings.substitutions.clone(),
        );
        let initial_mask = &arguments.active_realizations;
        let store = self.collaborators.case_store.clone();

        let mut context = factory
            .create(store.as_ref(), initial_mask, 0, None, false)
            .await?;
        self.collaborators
            .analysis
            .set_case_format(factory.target_case_format())
            .await?;

        self.run_and_post_process(&context).await?;

        let mut retries = RetryTracker::new(self.settings.max_retries_per_iteration);
        let mut last_transition: Option<Transition> = None;

        loop {
            self.enter(IterationState::Analyzing);
            let pre_count = self.collaborators.analysis.iteration_counter().await?;
            self.analyze_step(&context).await?;
            let post_count = self.collaborators.analysis.iteration_counter().await?;

            let outcome = classify(pre_count, post_count);
            debug!(pre_count, post_count, ?outcome, "analysis round finished");

            context = match outcome {
                AnalysisOutcome::Advanced => {
                    let next = factory
                        .create(store.as_ref(), initial_mask, post_count, Some(&context), false)
                        .await?;
                    if let Some(target) = next.target_case() {
                        store.switch_current(target).await?;
                    }
                    next
                }
                AnalysisOutcome::NotAdvanced => {
                    factory
                        .create(store.as_ref(), initial_mask, post_count, Some(&context), true)
                        .await?
                }
            };
            self.run_and_post_process(&context).await?;

            let transition = retries.record(outcome, post_count);
            self.status.retries = retries.retries();
            self.status.last_completed_iteration = Some(post_count);
            self.enter(transition.state());
            last_transition = Some(transition);

            match transition {
                Transition::Fail { .. } => break,
                Transition::Retry { iteration, attempt } => {
                    warn!(
                        iteration,
                        retry = attempt,
                        max_retries = retries.max_retries(),
                        "analysis did not advance, repeating iteration"
                    );
                }
                Transition::Advance { iteration } => {
                    info!(iteration, "analysis advanced");
                }
            }

            if post_count >= target_iterations {
                break;
            }
        }

        match last_transition {
            Some(Transition::Fail { iteration, retries }) => {
                Err(RunError::RetriesExhausted { retries, iteration })
            }
            Some(transition) if transition.iteration() >= target_iterations => {
                self.phases.set_phase(phase_count, "Simulations completed.", false);
                self.enter(IterationState::Done);
                Ok(context)
            }
            // The loop only exits through a failure or by reaching the target.
            _ => Err(RunError::RetriesExhausted {
                retries: retries.retries(),
                iteration: context.iteration(),
            }),
        }
    }

    /// Activate the analysis module; fails before any forecast work.
    async fn select_analysis_module(&mut self, module: &str) -> RunResult<()> {
        if !self.collaborators.analysis.select_module(module).await {
            return Err(RunError::ModuleLoad {
                module: module.to_string(),
            });
        }
        debug!(module, "analysis module selected");
        Ok(())
    }

    /// Forecast one context: run paths, pre-simulation hooks, forecast,
    /// sufficiency check, post-simulation hooks. No retry happens here.
    async fn run_and_post_process(&mut self, context: &RunContext) -> RunResult<()> {
        self.enter(IterationState::RunningForecast);
        let message = format!(
            "Running iteration {} of {} simulation iterations...",
            context.iteration(),
            self.phases.phase_count().saturating_sub(1)
        );
        self.phases.set_phase(context.iteration(), &message, false);

        self.phases.set_phase_name("Pre processing...", true);
        self.collaborators.forecast.create_runpaths(context).await?;
        self.collaborators
            .hooks
            .run_hooks(HookRuntime::PreSimulation, context)
            .await;

        self.phases.set_phase_name("Running forecast...", false);
        let successful = self.collaborators.forecast.run(context).await?;
        self.check_sufficient_realizations(successful, context)?;

        self.phases.set_phase_name("Post processing...", true);
        self.collaborators
            .hooks
            .run_hooks(HookRuntime::PostSimulation, context)
            .await;
        Ok(())
    }

    fn check_sufficient_realizations(
        &self,
        successful: usize,
        context: &RunContext,
    ) -> RunResult<()> {
        let required = self
            .settings
            .required_realizations(context.active_mask().count_active());
        debug!(
            iteration = context.iteration(),
            successful, required, "forecast finished"
        );
        if successful < required {
            return Err(RunError::InsufficientRealizations {
                successful,
                required,
            });
        }
        Ok(())
    }

    /// One analysis update between the pre- and post-update hooks.
    async fn analyze_step(&mut self, context: &RunContext) -> RunResult<()> {
        self.phases.set_phase_name("Analyzing...", true);

        self.phases.set_phase_name("Pre processing update...", true);
        self.collaborators
            .hooks
            .run_hooks(HookRuntime::PreUpdate, context)
            .await;

        if !self.collaborators.analysis.update(context).await? {
            return Err(RunError::AnalysisFailed {
                iteration: context.iteration(),
            });
        }

        self.phases.set_phase_name("Post processing update...", true);
        self.collaborators
            .hooks
            .run_hooks(HookRuntime::PostUpdate, context)
            .await;
        Ok(())
    }

    fn enter(&mut self, state: IterationState) {
        debug!(state = %state, "state transition");
        self.status.record_state(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(ControllerSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let settings = ControllerSettings {
            num_iterations: 0,
            ..ControllerSettings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, RunError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_max_iterations_rejected() {
        let settings = ControllerSettings {
            num_iterations: u32::MAX,
            ..ControllerSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(RunError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let settings = ControllerSettings {
            max_retries_per_iteration: 0,
            ..ControllerSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_required_realizations() {
        let mut settings = ControllerSettings::default();
        assert_eq!(settings.required_realizations(10), 10);
        settings.min_realizations = 7;
        assert_eq!(settings.required_realizations(10), 7);
        assert_eq!(settings.required_realizations(3), 3);
    }
}
