//! Classification of run errors into the categories users act on.

use std::fmt;

use super::RunError;

/// Category of a fatal run error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Module selection or configuration problem, raised before any run work.
    Configuration,
    /// The forecast step produced too few successful realizations.
    InsufficientRealizations,
    /// The analysis engine signalled failure directly.
    AnalysisFailure,
    /// Non-advancing analysis updates exhausted the retry budget.
    RetryExhaustion,
    /// A collaborator failed while doing its own work (IO, process spawn, ...).
    Collaborator,
}

impl ErrorKind {
    /// Short snake_case name, used in logs and run summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::InsufficientRealizations => "insufficient_realizations",
            ErrorKind::AnalysisFailure => "analysis_failure",
            ErrorKind::RetryExhaustion => "retry_exhaustion",
            ErrorKind::Collaborator => "collaborator",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RunError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RunError::ModuleLoad { .. } | RunError::InvalidConfiguration(_) => {
                ErrorKind::Configuration
            }
            RunError::InsufficientRealizations { .. } => ErrorKind::InsufficientRealizations,
            RunError::AnalysisFailed { .. } => ErrorKind::AnalysisFailure,
            RunError::RetriesExhausted { .. } => ErrorKind::RetryExhaustion,
            RunError::CaseStore(_)
            | RunError::Forecast(_)
            | RunError::Analysis(_)
            | RunError::Io(_) => ErrorKind::Collaborator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_load_is_configuration() {
        let err = RunError::ModuleLoad {
            module: "NOPE".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "Unable to load analysis module 'NOPE'!");
    }

    #[test]
    fn test_retries_exhausted_message_names_budget_and_iteration() {
        let err = RunError::RetriesExhausted {
            retries: 2,
            iteration: 0,
        };
        assert_eq!(err.kind(), ErrorKind::RetryExhaustion);
        let msg = err.to_string();
        assert!(msg.contains("(2 retries)"));
        assert!(msg.contains("for iteration 0"));
    }

    #[test]
    fn test_insufficient_realizations_message() {
        let err = RunError::InsufficientRealizations {
            successful: 3,
            required: 5,
        };
        assert_eq!(err.kind(), ErrorKind::InsufficientRealizations);
        assert!(err.to_string().starts_with("Too many simulations have failed!"));
    }

    #[test]
    fn test_io_errors_are_collaborator_errors() {
        let err: RunError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert_eq!(err.kind(), ErrorKind::Collaborator);
        assert_eq!(err.kind().to_string(), "collaborator");
    }
}
