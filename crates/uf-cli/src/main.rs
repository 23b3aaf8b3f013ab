//! unfoldtest CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use uf_harness::{Harness, RunConfig};

#[derive(Parser)]
#[command(name = "unfoldtest")]
#[command(about = "unfoldtest - toy Monte Carlo validation of unfolding algorithms")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all trials and write the report
    Run {
        /// Run configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file for the report (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Override worker threads (0 = auto, 1 = sequential).
        #[arg(long)]
        threads: Option<usize>,

        /// Override the number of trials.
        #[arg(long)]
        trials: Option<usize>,

        /// Override the base seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Also write the retained toys to this file (sets `keep_toys`).
        #[arg(long)]
        toys_output: Option<PathBuf>,
    },

    /// Check a configuration and build its response without running trials
    Validate {
        /// Run configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Run { config, output, threads, trials, seed, toys_output } => {
            cmd_run(&config, output.as_ref(), threads, trials, seed, toys_output.as_ref())
        }
        Commands::Validate { config, output } => cmd_validate(&config, output.as_ref()),
        Commands::Version => {
            println!("unfoldtest {}", uf_core::VERSION);
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<RunConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = RunConfig::from_json(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

fn cmd_run(
    config_path: &Path,
    output: Option<&PathBuf>,
    threads: Option<usize>,
    trials: Option<usize>,
    seed: Option<u64>,
    toys_output: Option<&PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(t) = threads {
        config.threads = t;
    }
    if let Some(n) = trials {
        config.n_trials = n;
    }
    if let Some(s) = seed {
        config.seed = s;
    }
    if toys_output.is_some() {
        config.keep_toys = true;
    }

    let harness = Harness::new(config)?;
    let start = std::time::Instant::now();
    let out = harness.run()?;
    tracing::info!(
        "{} trials ({} failed) in {:.3}s, coverage {:.4}",
        out.report.n_trials_completed,
        out.report.failed_trial_count,
        start.elapsed().as_secs_f64(),
        out.report.coverage_fraction
    );

    if let (Some(path), Some(toys)) = (toys_output, out.toys.as_ref()) {
        write_json(Some(path), serde_json::to_value(toys)?)?;
    }
    write_json(output, serde_json::to_value(&out.report)?)
}

fn cmd_validate(config_path: &Path, output: Option<&PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let harness = Harness::new(config)?;
    let response = harness.response();

    let efficiency: Vec<f64> = (0..response.n_truth()).map(|j| response.efficiency(j)).collect();
    let summary = serde_json::json!({
        "valid": true,
        "algorithm": harness.config().algorithm.name,
        "n_trials": harness.config().n_trials,
        "truth_edges": response.truth_binning().edges(),
        "measured_edges": response.measured_binning().edges(),
        "efficiency": efficiency,
        "expected_truth": harness.sampler().expected_truth(),
        "normalization_deviation": response.normalization_deviation(),
    });
    write_json(output, summary)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
