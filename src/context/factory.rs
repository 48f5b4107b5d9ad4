//! Construction of successive run contexts.

use crate::collaborators::CaseStore;
use crate::error::{RunError, RunResult};

use super::{ActiveMask, RunContext, SubstitutionList};

/// Builds run contexts for one run.
///
/// The run-wide naming templates and substitution table live here; the
/// per-round parts (iteration, prior context, rerun flag) are passed to
/// [`RunContextFactory::create`].
#[derive(Debug, Clone)]
pub struct RunContextFactory {
    target_case_format: String,
    runpath_template: String,
    jobname_template: String,
    substitutions: SubstitutionList,
}

impl RunContextFactory {
    pub fn new(
        target_case_format: impl Into<String>,
        runpath_template: impl Into<String>,
        jobname_template: impl Into<String>,
        substitutions: SubstitutionList,
    ) -> Self {
        Self {
            target_case_format: target_case_format.into(),
            runpath_template: runpath_template.into(),
            jobname_template: jobname_template.into(),
            substitutions,
        }
    }

    pub fn target_case_format(&self) -> &str {
        &self.target_case_format
    }

    /// Build the context for iteration `iteration`.
    ///
    /// - Without a prior context the mask is `initial_mask`; otherwise it is
    ///   copied from `prior`.
    /// - The source case is resolved at `iteration`.
    /// - The target case is resolved at `iteration + 1`, unless `rerun` is set,
    ///   in which case there is none.
    pub async fn create(
        &self,
        store: &dyn CaseStore,
        initial_mask: &ActiveMask,
        iteration: u32,
        prior: Option<&RunContext>,
        rerun: bool,
    ) -> RunResult<RunContext> {
        let mask = match prior {
            Some(prior) => prior.active_mask().clone(),
            None => initial_mask.clone(),
        };

        let source_case = store.resolve(&self.target_case_format, iteration).await?;
        let target_case = if rerun {
            None
        } else {
            let next = iteration.checked_add(1).ok_or_else(|| {
                RunError::Analysis(format!("iteration counter {} cannot advance", iteration))
            })?;
            Some(store.resolve(&self.target_case_format, next).await?)
        };

        tracing::debug!(
            iteration,
            rerun,
            source = %source_case,
            target = target_case.as_ref().map(|c| c.name.as_str()).unwrap_or("-"),
            "built run context"
        );

        Ok(RunContext::ensemble_smoother(
            source_case,
            target_case,
            mask,
            self.runpath_template.clone(),
            self.jobname_template.clone(),
            self.substitutions.clone(),
            iteration,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::context::{render_case_name, CaseHandle};

    #[derive(Default)]
    struct RecordingStore {
        resolved: Mutex<Vec<(String, u32)>>,
    }

    #[async_trait]
    impl CaseStore for RecordingStore {
        async fn resolve(&self, template: &str, iteration: u32) -> RunResult<CaseHandle> {
            self.resolved
                .lock()
                .unwrap()
                .push((template.to_string(), iteration));
            Ok(CaseHandle::new(render_case_name(template, iteration)?, iteration))
        }

        async fn switch_current(&self, _case: &CaseHandle) -> RunResult<()> {
            Ok(())
        }
    }

    fn factory() -> RunContextFactory {
        RunContextFactory::new("iter-%d", "run/<IENS>", "job<IENS>", SubstitutionList::new())
    }

    #[tokio::test]
    async fn test_first_context_uses_initial_mask() {
        let store = RecordingStore::default();
        let mask = ActiveMask::from_indices(4, &[1, 3]).unwrap();

        let ctx = factory().create(&store, &mask, 0, None, false).await.unwrap();

        assert_eq!(ctx.active_mask(), &mask);
        assert_eq!(ctx.source_case().name, "iter-0");
        assert_eq!(ctx.target_case().unwrap().name, "iter-1");
        assert_eq!(ctx.iteration(), 0);
        assert!(!ctx.is_rerun());
    }

    #[tokio::test]
    async fn test_next_context_copies_prior_mask() {
        let store = RecordingStore::default();
        let initial = ActiveMask::from_indices(4, &[0, 1]).unwrap();
        let prior = factory().create(&store, &initial, 0, None, false).await.unwrap();

        // A different initial mask must not leak into non-first contexts.
        let other = ActiveMask::all(4);
        let next = factory()
            .create(&store, &other, 1, Some(&prior), false)
            .await
            .unwrap();

        assert_eq!(next.active_mask(), &initial);
        assert_eq!(next.source_case().name, "iter-1");
        assert_eq!(next.target_case().unwrap().iteration, 2);
    }

    #[tokio::test]
    async fn test_rerun_context_has_no_target_case() {
        let store = RecordingStore::default();
        let mask = ActiveMask::all(2);
        let prior = factory().create(&store, &mask, 0, None, false).await.unwrap();
        store.resolved.lock().unwrap().clear();

        let rerun = factory()
            .create(&store, &mask, 0, Some(&prior), true)
            .await
            .unwrap();

        assert!(rerun.is_rerun());
        assert!(rerun.target_case().is_none());
        assert_eq!(rerun.iteration(), prior.iteration());
        assert_eq!(rerun.source_case(), prior.source_case());
        assert_eq!(
            *store.resolved.lock().unwrap(),
            vec![("iter-%d".to_string(), 0)]
        );
    }

    #[tokio::test]
    async fn test_counter_at_limit_is_an_error() {
        let store = RecordingStore::default();
        let mask = ActiveMask::all(2);

        let err = factory()
            .create(&store, &mask, u32::MAX, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Analysis(_)));

        // A rerun has no target case, so the same counter is fine.
        let rerun = factory().create(&store, &mask, u32::MAX, None, true).await;
        assert!(rerun.is_ok());
    }
}
