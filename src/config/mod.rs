//! Run configuration for the smoother.
//!
//! This module defines the configuration loaded from a TOML file, with
//! environment variable overrides, and its conversion into controller
//! settings and run arguments.

pub mod realizations;

pub use realizations::parse_realizations;

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collaborators::HookRuntime;
use crate::context::substitution::has_iteration_placeholder;
use crate::context::{ActiveMask, SubstitutionList};
use crate::runner::{ControllerSettings, RunArguments};

/// Prefix of environment variable overrides, e.g. `IES__ANALYSIS__NUM_ITERATIONS`.
pub const ENV_PREFIX: &str = "IES";

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] ConfigError),

    /// The configuration file path is invalid.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),

    /// The configuration parsed but cannot drive a run.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The configuration could not be written out as TOML.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// An analysis module and the command that performs its update step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    pub command: String,
}

/// `[analysis]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSection {
    /// Module activated for the run.
    pub module: String,
    /// Number of analysis iterations.
    pub num_iterations: u32,
    /// Consecutive non-advancing updates allowed per iteration.
    pub num_retries_per_iteration: u32,
    /// Modules that can be selected.
    pub modules: Vec<ModuleConfig>,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            module: "IES_ENKF".to_string(),
            num_iterations: 4,
            num_retries_per_iteration: 4,
            modules: vec![ModuleConfig {
                name: "IES_ENKF".to_string(),
                command: "./ies_update.sh".to_string(),
            }],
        }
    }
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSection {
    /// Target case naming template with an iteration placeholder.
    pub target_case: String,
    pub runpath: String,
    pub jobname: String,
    /// Ensemble size.
    pub num_realizations: usize,
    /// Active realizations as ranges, e.g. `0-9,12`. All when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realizations: Option<String>,
    /// Successful realizations required per forecast (0 = all active).
    pub min_realizations: usize,
}

impl Default for RunSection {
    fn default() -> Self {
        let settings = ControllerSettings::default();
        Self {
            target_case: "iter-%d".to_string(),
            runpath: settings.runpath_template,
            jobname: settings.jobname_template,
            num_realizations: 10,
            realizations: None,
            min_realizations: 0,
        }
    }
}

/// `[forecast]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSection {
    /// Command run once per realization inside its run path.
    pub job: String,
    /// Maximum number of realizations running at once.
    pub max_running: usize,
    /// Per-realization time limit in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_timeout_secs: Option<u64>,
}

impl Default for ForecastSection {
    fn default() -> Self {
        Self {
            job: "./forecast.sh".to_string(),
            max_running: 4,
            job_timeout_secs: None,
        }
    }
}

/// `[hooks]` section: commands per hook runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksSection {
    pub pre_simulation: Vec<String>,
    pub post_simulation: Vec<String>,
    pub pre_update: Vec<String>,
    pub post_update: Vec<String>,
}

impl HooksSection {
    pub fn commands(&self, runtime: HookRuntime) -> &[String] {
        match runtime {
            HookRuntime::PreSimulation => &self.pre_simulation,
            HookRuntime::PostSimulation => &self.post_simulation,
            HookRuntime::PreUpdate => &self.pre_update,
            HookRuntime::PostUpdate => &self.post_update,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory holding one subdirectory per case.
    pub root: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("storage"),
        }
    }
}

/// One `[[substitutions]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionEntry {
    pub key: String,
    pub value: String,
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    pub analysis: AnalysisSection,
    pub run: RunSection,
    pub forecast: ForecastSection,
    pub hooks: HooksSection,
    pub storage: StorageSection,
    pub substitutions: Vec<SubstitutionEntry>,
}

impl SmootherConfig {
    /// Load configuration from a TOML file.
    ///
    /// Values can be overridden from the environment as
    /// `IES__<SECTION>__<KEY>` (e.g. `IES__ANALYSIS__NUM_ITERATIONS=6`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be parsed, or the
    /// path is not valid UTF-8.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigLoadError::InvalidPath(format!("{:?}", path)))?;

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound(path_str.to_string()));
        }

        let config = Config::builder()
            .add_source(File::new(path_str, FileFormat::Toml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from a TOML string, without environment overrides.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigLoadError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check that the configuration can drive a run.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.analysis.num_iterations == 0 {
            return Err(ConfigLoadError::Invalid(
                "analysis.num_iterations must be at least 1".to_string(),
            ));
        }
        if self.analysis.num_iterations == u32::MAX {
            return Err(ConfigLoadError::Invalid(format!(
                "analysis.num_iterations must be below {}",
                u32::MAX
            )));
        }
        if self.analysis.num_retries_per_iteration == 0 {
            return Err(ConfigLoadError::Invalid(
                "analysis.num_retries_per_iteration must be at least 1".to_string(),
            ));
        }
        if !has_iteration_placeholder(&self.run.target_case) {
            return Err(ConfigLoadError::Invalid(format!(
                "run.target_case '{}' needs an iteration placeholder (%d or <ITER>)",
                self.run.target_case
            )));
        }
        if self.forecast.max_running == 0 {
            return Err(ConfigLoadError::Invalid(
                "forecast.max_running must be at least 1".to_string(),
            ));
        }
        let mask = self.active_mask()?;
        if mask.count_active() == 0 {
            return Err(ConfigLoadError::Invalid(
                "no active realizations selected".to_string(),
            ));
        }
        Ok(())
    }

    /// Active realizations selected by `run.realizations` (all when unset).
    pub fn active_mask(&self) -> Result<ActiveMask, ConfigLoadError> {
        match &self.run.realizations {
            Some(ranges) => parse_realizations(ranges, self.run.num_realizations)
                .map_err(|e| ConfigLoadError::Invalid(e.to_string())),
            None => Ok(ActiveMask::all(self.run.num_realizations)),
        }
    }

    pub fn substitution_list(&self) -> SubstitutionList {
        self.substitutions
            .iter()
            .map(|entry| (entry.key.clone(), entry.value.clone()))
            .collect()
    }

    /// Command registered for an analysis module.
    pub fn module_command(&self, name: &str) -> Option<&str> {
        self.analysis
            .modules
            .iter()
            .find(|module| module.name == name)
            .map(|module| module.command.as_str())
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            num_iterations: self.analysis.num_iterations,
            max_retries_per_iteration: self.analysis.num_retries_per_iteration,
            min_realizations: self.run.min_realizations,
            runpath_template: self.run.runpath.clone(),
            jobname_template: self.run.jobname.clone(),
            substitutions: self.substitution_list(),
        }
    }

    pub fn run_arguments(&self) -> Result<RunArguments, ConfigLoadError> {
        Ok(RunArguments {
            analysis_module: self.analysis.module.clone(),
            target_case_format: self.run.target_case.clone(),
            active_realizations: self.active_mask()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SmootherConfig::default();
        config.validate().expect("default config validates");
        assert_eq!(config.analysis.num_retries_per_iteration, 4);
        assert_eq!(config.active_mask().unwrap().count_active(), 10);
    }

    #[test]
    fn test_parse_full_config() {
        let config = SmootherConfig::from_toml_str(
            r#"
            [analysis]
            module = "STD_ENKF"
            num_iterations = 3
            num_retries_per_iteration = 2

            [[analysis.modules]]
            name = "STD_ENKF"
            command = "python update.py"

            [run]
            target_case = "smoother_<ITER>"
            num_realizations = 5
            realizations = "0-2,4"
            min_realizations = 3

            [forecast]
            job = "sh run.sh"
            max_running = 2
            job_timeout_secs = 30

            [hooks]
            pre_update = ["echo pre"]

            [[substitutions]]
            key = "<CASE_ROOT>"
            value = "/scratch"
            "#,
        )
        .expect("parse config");

        config.validate().expect("valid");
        assert_eq!(config.module_command("STD_ENKF"), Some("python update.py"));
        assert_eq!(config.module_command("IES_ENKF"), None);
        assert_eq!(config.hooks.commands(HookRuntime::PreUpdate), ["echo pre"]);
        assert!(config.hooks.commands(HookRuntime::PostUpdate).is_empty());
        assert_eq!(config.forecast.job_timeout_secs, Some(30));

        let settings = config.controller_settings();
        assert_eq!(settings.num_iterations, 3);
        assert_eq!(settings.max_retries_per_iteration, 2);
        assert_eq!(settings.min_realizations, 3);
        assert_eq!(settings.substitutions.get("<CASE_ROOT>"), Some("/scratch"));

        let args = config.run_arguments().unwrap();
        assert_eq!(args.analysis_module, "STD_ENKF");
        assert_eq!(args.active_realizations.active_indices(), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_zero_iterations_is_invalid() {
        let config = SmootherConfig::from_toml_str("[analysis]\nnum_iterations = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("num_iterations"));
    }

    #[test]
    fn test_max_iterations_is_invalid() {
        let mut config = SmootherConfig::default();
        config.analysis.num_iterations = u32::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be below"));
    }

    #[test]
    fn test_target_case_without_placeholder_is_invalid() {
        let config = SmootherConfig::from_toml_str("[run]\ntarget_case = \"default\"\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigLoadError::Invalid(_))
        ));
    }

    #[test]
    fn test_realizations_outside_ensemble_are_invalid() {
        let config = SmootherConfig::from_toml_str(
            "[run]\nnum_realizations = 3\nrealizations = \"0-5\"\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_settings() {
        let mut config = SmootherConfig::default();
        config.run.realizations = Some("1-3".to_string());
        config.substitutions.push(SubstitutionEntry {
            key: "<USER>".to_string(),
            value: "me".to_string(),
        });

        let text = config.to_toml_string().expect("serialize");
        let parsed = SmootherConfig::from_toml_str(&text).expect("parse");

        assert_eq!(parsed.run.realizations.as_deref(), Some("1-3"));
        assert_eq!(parsed.substitutions, config.substitutions);
        assert_eq!(parsed.analysis.modules, config.analysis.modules);
    }

    #[test]
    fn test_load_missing_file() {
        let err = SmootherConfig::load("/nonexistent/ies.toml").unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileNotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ies.toml");
        std::fs::write(&path, "[analysis]\nnum_iterations = 7\n").expect("write");

        let config = SmootherConfig::load(&path).expect("load");
        assert_eq!(config.analysis.num_iterations, 7);
        assert_eq!(config.run.target_case, "iter-%d");
    }
}
