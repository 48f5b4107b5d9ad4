//! End-to-end runs of the controller over the filesystem and process
//! adapters.

use std::fs;
use std::sync::Arc;

use tempfile::tempdir;

use ensemble_smoother::adapters::{
    FsCaseStore, ProcessAnalysisEngine, ProcessForecastExecutor, ShellHookRunner,
};
use ensemble_smoother::collaborators::HookRuntime;
use ensemble_smoother::context::{ActiveMask, SubstitutionList};
use ensemble_smoother::error::RunError;
use ensemble_smoother::runner::{Collaborators, ControllerSettings, IteratedSmoother, RunArguments};

fn settings(num_iterations: u32, max_retries: u32) -> ControllerSettings {
    ControllerSettings {
        num_iterations,
        max_retries_per_iteration: max_retries,
        runpath_template: "sims/<CASE_PREFIX>-<IENS>/<ITER>".to_string(),
        substitutions: [("<CASE_PREFIX>".to_string(), "real".to_string())]
            .into_iter()
            .collect::<SubstitutionList>(),
        ..ControllerSettings::default()
    }
}

fn arguments(mask: ActiveMask) -> RunArguments {
    RunArguments {
        analysis_module: "STEP".to_string(),
        target_case_format: "iter-%d".to_string(),
        active_realizations: mask,
    }
}

#[tokio::test]
async fn test_process_adapters_complete_run() {
    let dir = tempdir().unwrap();
    let base = dir.path();

    let store = Arc::new(FsCaseStore::new(base.join("storage")));
    let forecast = Arc::new(ProcessForecastExecutor::new(base, "echo $IES_ITER > iter.txt"));
    let analysis = Arc::new(
        ProcessAnalysisEngine::new(base).with_module("STEP", "echo ITER=$((IES_ITER_COUNTER + 1))"),
    );
    let hooks = Arc::new(
        ShellHookRunner::new(base)
            .with_hook(HookRuntime::PostUpdate, "echo $IES_HOOK >> hooks.log"),
    );

    let collaborators =
        Collaborators::new(store.clone(), forecast, analysis).with_hooks(hooks);
    let mut smoother = IteratedSmoother::new(settings(2, 2), collaborators);

    let mask = ActiveMask::from_indices(4, &[1, 3]).unwrap();
    let context = smoother.run_simulations(arguments(mask)).await.unwrap();

    assert_eq!(context.iteration(), 2);
    assert_eq!(store.current().await.unwrap().as_deref(), Some("iter-3"));

    for iteration in 0..=2 {
        let path = base.join(format!("sims/real-3/{}/iter.txt", iteration));
        assert_eq!(fs::read_to_string(path).unwrap().trim(), iteration.to_string());
    }
    assert!(!base.join("sims/real-0").exists());

    let hooks_log = fs::read_to_string(base.join("hooks.log")).unwrap();
    assert_eq!(hooks_log.lines().count(), 2);
}

#[test]
fn test_failing_update_command_stops_run() {
    let dir = tempdir().unwrap();
    let base = dir.path().to_path_buf();

    let result = tokio_test::block_on(async move {
        let collaborators = Collaborators::new(
            Arc::new(FsCaseStore::new(base.join("storage"))),
            Arc::new(ProcessForecastExecutor::new(&base, "true")),
            Arc::new(ProcessAnalysisEngine::new(&base).with_module("STEP", "exit 3")),
        );
        let mut smoother = IteratedSmoother::new(settings(2, 2), collaborators);
        smoother.run_simulations(arguments(ActiveMask::all(2))).await
    });

    assert!(matches!(result, Err(RunError::AnalysisFailed { iteration: 0 })));
}

#[tokio::test]
async fn test_failed_realizations_stop_run() {
    let dir = tempdir().unwrap();
    let base = dir.path();

    let collaborators = Collaborators::new(
        Arc::new(FsCaseStore::new(base.join("storage"))),
        Arc::new(ProcessForecastExecutor::new(base, "test <IENS> -ne 1")),
        Arc::new(ProcessAnalysisEngine::new(base).with_module("STEP", "echo ITER=1")),
    );
    let mut smoother = IteratedSmoother::new(settings(1, 2), collaborators);

    let err = smoother
        .run_simulations(arguments(ActiveMask::all(3)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RunError::InsufficientRealizations {
            successful: 2,
            required: 3
        }
    ));
    assert!(err.to_string().starts_with("Too many simulations have failed!"));
}
