use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use owo_colors::OwoColorize;

use ensemble_smoother::adapters::{
    FsCaseStore, ProcessAnalysisEngine, ProcessForecastExecutor, ShellHookRunner,
};
use ensemble_smoother::collaborators::{HookRuntime, ProgressSink, TracingProgress};
use ensemble_smoother::config::{parse_realizations, SmootherConfig};
use ensemble_smoother::logging::{init_logging, LoggingConfig};
use ensemble_smoother::runner::{Collaborators, IteratedSmoother};
use ensemble_smoother::ui::{render_summary, TerminalProgress, Theme};

#[derive(Parser, Debug)]
#[command(name = "ies")]
#[command(version)]
#[command(about = "Iterated ensemble smoother run controller")]
struct Cli {
    /// Suppress all output except warnings and errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short, action = ArgAction::Count, global = true, conflicts_with = "quiet")]
    verbose: u8,

    /// Disable colors (also respects NO_COLOR environment variable)
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the smoother until all iterations are done
    Run(RunArgs),

    /// Write a default configuration file
    Init {
        /// Output file
        #[arg(long, short, default_value = "ies.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load and validate a configuration, then print it resolved
    CheckConfig {
        /// Configuration file
        #[arg(long, short)]
        config: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Configuration file
    #[arg(long, short)]
    config: PathBuf,

    /// Number of analysis iterations (overrides analysis.num_iterations)
    #[arg(long, value_name = "N")]
    iterations: Option<u32>,

    /// Retries per iteration (overrides analysis.num_retries_per_iteration)
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Active realizations, e.g. "0-9,12"
    #[arg(long, value_name = "RANGE")]
    realizations: Option<String>,

    /// Analysis module to activate
    #[arg(long, value_name = "NAME")]
    module: Option<String>,

    /// Target case format, e.g. "iter-%d"
    #[arg(long, value_name = "FMT")]
    target_case: Option<String>,

    /// Write the run status as JSON to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,

    /// Report progress in the log instead of a progress bar
    #[arg(long)]
    no_progress: bool,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let use_color = !cli.no_color && std::env::var("NO_COLOR").is_err();

    init_logging(LoggingConfig::from_flags(cli.verbose, cli.quiet).with_ansi(use_color));

    let result = match &cli.command {
        Commands::Run(args) => run(&cli, args, use_color).await,
        Commands::Init { output, force } => init(output, *force, cli.quiet),
        Commands::CheckConfig { config } => check_config(config),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            if use_color {
                eprintln!("{} {}", "error:".color(Theme::default().error).bold(), err);
            } else {
                eprintln!("error: {}", err);
            }
            ExitCode::FAILURE
        }
    }
}

/// Load the configuration and apply the command-line overrides.
fn resolve_config(args: &RunArgs) -> CliResult<SmootherConfig> {
    let mut config = SmootherConfig::load(&args.config)?;

    if let Some(iterations) = args.iterations {
        config.analysis.num_iterations = iterations;
    }
    if let Some(retries) = args.max_retries {
        config.analysis.num_retries_per_iteration = retries;
    }
    if let Some(module) = &args.module {
        config.analysis.module = module.clone();
    }
    if let Some(target_case) = &args.target_case {
        config.run.target_case = target_case.clone();
    }
    if let Some(realizations) = &args.realizations {
        // Parse early so a bad range is reported against the flag.
        parse_realizations(realizations, config.run.num_realizations)?;
        config.run.realizations = Some(realizations.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Relative paths in the configuration are taken from its directory.
fn base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn build_collaborators(
    config: &SmootherConfig,
    base: &Path,
    progress: Arc<dyn ProgressSink>,
) -> Collaborators {
    let store = FsCaseStore::new(base.join(&config.storage.root));

    let forecast = ProcessForecastExecutor::new(base, config.forecast.job.clone())
        .with_max_running(config.forecast.max_running)
        .with_job_timeout(config.forecast.job_timeout_secs.map(Duration::from_secs));

    let analysis = config
        .analysis
        .modules
        .iter()
        .fold(ProcessAnalysisEngine::new(base), |engine, module| {
            engine.with_module(module.name.clone(), module.command.clone())
        });

    let hooks = HookRuntime::ALL
        .iter()
        .fold(ShellHookRunner::new(base), |runner, runtime| {
            runner.with_hooks(*runtime, config.hooks.commands(*runtime).iter().cloned())
        });

    Collaborators::new(Arc::new(store), Arc::new(forecast), Arc::new(analysis))
        .with_hooks(Arc::new(hooks))
        .with_progress(progress)
}

async fn run(cli: &Cli, args: &RunArgs, use_color: bool) -> CliResult<ExitCode> {
    let config = resolve_config(args)?;
    let base = base_dir(&args.config);

    let terminal = (!args.no_progress && !cli.quiet).then(|| Arc::new(TerminalProgress::new()));
    let progress: Arc<dyn ProgressSink> = match &terminal {
        Some(terminal) => terminal.clone(),
        None => Arc::new(TracingProgress),
    };

    let collaborators = build_collaborators(&config, &base, progress);
    let mut smoother = IteratedSmoother::new(config.controller_settings(), collaborators);
    let result = smoother.run_simulations(config.run_arguments()?).await;

    if let Some(terminal) = &terminal {
        terminal.finish();
    }

    if let Some(path) = &args.summary {
        smoother.status().save_to_path(path)?;
        tracing::debug!(path = %path.display(), "wrote run summary");
    }

    if !cli.quiet {
        eprint!("{}", render_summary(smoother.status(), &Theme::default(), use_color));
    }

    match result {
        Ok(context) => {
            if !cli.quiet {
                println!("Simulations completed. Current case: {}", context.source_case());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Err(err.into()),
    }
}

fn init(output: &Path, force: bool, quiet: bool) -> CliResult<ExitCode> {
    if output.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            output.display()
        )
        .into());
    }
    let toml = SmootherConfig::default().to_toml_string()?;
    std::fs::write(output, toml)?;
    if !quiet {
        println!("Wrote default configuration to {}", output.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn check_config(path: &Path) -> CliResult<ExitCode> {
    let config = SmootherConfig::load(path)?;
    config.validate()?;
    print!("{}", config.to_toml_string()?);
    Ok(ExitCode::SUCCESS)
}
