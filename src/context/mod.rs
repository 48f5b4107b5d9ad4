//! Run contexts describing one simulation round.
//!
//! A [`RunContext`] is built right before each forecast and never mutated
//! afterwards. Advancing the run always means building a new context through
//! the [`RunContextFactory`].

pub mod factory;
pub mod mask;
pub mod substitution;

pub use factory::RunContextFactory;
pub use mask::ActiveMask;
pub use substitution::{render_case_name, SubstitutionList};

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Handle to an iteration-indexed ensemble-state store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseHandle {
    /// Case name after the naming template has been rendered.
    pub name: String,
    /// Iteration the case was resolved for.
    pub iteration: u32,
}

impl CaseHandle {
    /// Create a new case handle.
    pub fn new(name: impl Into<String>, iteration: u32) -> Self {
        Self {
            name: name.into(),
            iteration,
        }
    }
}

impl fmt::Display for CaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Immutable description of one simulation round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunContext {
    source_case: CaseHandle,
    target_case: Option<CaseHandle>,
    active_mask: ActiveMask,
    runpath_template: String,
    jobname_template: String,
    substitutions: SubstitutionList,
    iteration: u32,
    rerun: bool,
}

impl RunContext {
    /// Build an ensemble-smoother context.
    ///
    /// A context without a target case is a rerun: it repeats an iteration
    /// without writing a new ensemble-state slot.
    #[allow(clippy::too_many_arguments)]
    pub fn ensemble_smoother(
        source_case: CaseHandle,
        target_case: Option<CaseHandle>,
        active_mask: ActiveMask,
        runpath_template: impl Into<String>,
        jobname_template: impl Into<String>,
        substitutions: SubstitutionList,
        iteration: u32,
    ) -> Self {
        let rerun = target_case.is_none();
        Self {
            source_case,
            target_case,
            active_mask,
            runpath_template: runpath_template.into(),
            jobname_template: jobname_template.into(),
            substitutions,
            iteration,
            rerun,
        }
    }

    /// Case the forecast reads prior realization state from.
    pub fn source_case(&self) -> &CaseHandle {
        &self.source_case
    }

    /// Case updated state is written into; `None` for reruns.
    pub fn target_case(&self) -> Option<&CaseHandle> {
        self.target_case.as_ref()
    }

    pub fn active_mask(&self) -> &ActiveMask {
        &self.active_mask
    }

    pub fn runpath_template(&self) -> &str {
        &self.runpath_template
    }

    pub fn jobname_template(&self) -> &str {
        &self.jobname_template
    }

    pub fn substitutions(&self) -> &SubstitutionList {
        &self.substitutions
    }

    /// Analysis iteration this context belongs to.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn is_rerun(&self) -> bool {
        self.rerun
    }

    /// Run path of one realization with all placeholders resolved.
    pub fn runpath(&self, realization: usize) -> PathBuf {
        PathBuf::from(self.render(&self.runpath_template, realization))
    }

    /// Job name of one realization with all placeholders resolved.
    pub fn jobname(&self, realization: usize) -> String {
        self.render(&self.jobname_template, realization)
    }

    /// Resolve `<IENS>`/`<ITER>` (or positional `%d` pairs) and then the
    /// substitution table.
    pub fn render(&self, template: &str, realization: usize) -> String {
        let positional = substitution::fill_positional(template, realization, self.iteration);
        let with_builtins = positional
            .replace("<IENS>", &realization.to_string())
            .replace("<ITER>", &self.iteration.to_string());
        self.substitutions.substitute(&with_builtins)
    }
}
