//! phaseopt CLI - Project Schedule Optimization Engine
//!
//! Loads a scenario file, then checks it, optimizes one schedule, or sweeps
//! objective weights and prints the Pareto frontier.
//!
//! Exit codes: 0 on success, 1 on errors, 2 when `optimize` ends without a
//! usable schedule.

mod report;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use phaseopt_core::{ProjectModel, Scenario};
use phaseopt_solver::backend::backend_by_name;
use phaseopt_solver::{Optimizer, ParetoSweep};

use report::OutputFormat;

#[derive(Parser)]
#[command(name = "phaseopt")]
#[command(author, version, about = "Project schedule optimization engine", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Solver backend (microlp, or cp with the cp-solver feature)
    #[arg(long, global = true, default_value = "microlp", env = "PHASEOPT_BACKEND")]
    backend: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a scenario and report usable and skipped rows
    Check {
        /// Scenario file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Optimize one schedule with the scenario's weights and constraints
    Optimize {
        /// Scenario file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sweep objective weights and report the Pareto frontier
    Sweep {
        /// Scenario file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Grid resolution per free weight
        #[arg(long)]
        steps: Option<u32>,

        /// Worker threads
        #[arg(long)]
        threads: Option<usize>,

        /// Stop after this many combinations
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Stop starting combinations after this many milliseconds
        #[arg(long)]
        time_budget_ms: Option<u64>,

        /// Only print the frontier
        #[arg(long)]
        frontier_only: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Commands::Check { file, format } => cmd_check(&file, format),
        Commands::Optimize {
            file,
            format,
            output,
        } => cmd_optimize(&file, &cli.backend, format, output.as_deref()),
        Commands::Sweep {
            file,
            steps,
            threads,
            max_iterations,
            time_budget_ms,
            frontier_only,
            format,
            output,
        } => {
            let mut scenario = load_scenario(&file)?;
            if let Some(steps) = steps {
                scenario.sweep.steps = steps;
            }
            if threads.is_some() {
                scenario.sweep.threads = threads;
            }
            if max_iterations.is_some() {
                scenario.sweep.max_iterations = max_iterations;
            }
            if time_budget_ms.is_some() {
                scenario.sweep.time_budget_ms = time_budget_ms;
            }
            cmd_sweep(&scenario, &cli.backend, frontier_only, format, output.as_deref())
        }
    }
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    Scenario::load(path).with_context(|| format!("Failed to load scenario: {}", path.display()))
}

fn build_project(scenario: &Scenario, path: &Path) -> Result<ProjectModel> {
    scenario
        .build_model()
        .with_context(|| format!("No schedulable project in {}", path.display()))
}

fn optimizer(scenario: &Scenario, backend: &str) -> Result<Optimizer> {
    Ok(Optimizer::new(scenario.run.clone())?.with_backend(backend_by_name(backend)?))
}

fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn cmd_check(file: &Path, format: OutputFormat) -> Result<ExitCode> {
    let scenario = load_scenario(file)?;
    let project = build_project(&scenario, file)?;
    let (constraints, skipped) = scenario.hard_constraints();
    emit(&report::check(&project, &constraints, &skipped, format)?, None)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_optimize(
    file: &Path,
    backend: &str,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let scenario = load_scenario(file)?;
    let project = build_project(&scenario, file)?;
    let result = optimizer(&scenario, backend)?
        .optimize_with(&project, &scenario)
        .context("Optimization failed")?;

    emit(&report::optimization(&result, format)?, output)?;

    if result.schedule.is_some() {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("No usable schedule: solver status {}", result.status);
        Ok(ExitCode::from(2))
    }
}

fn cmd_sweep(
    scenario: &Scenario,
    backend: &str,
    frontier_only: bool,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let project = scenario.build_model().context("No schedulable project")?;
    let (constraints, _) = scenario.hard_constraints();

    let sweep = ParetoSweep::new(optimizer(scenario, backend)?, scenario.sweep.clone());
    let result = sweep.run(&project, &constraints).context("Sweep failed")?;

    emit(&report::sweep(&result, frontier_only, format)?, output)?;
    Ok(ExitCode::SUCCESS)
}
