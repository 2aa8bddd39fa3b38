//! aquabound CLI - Pump schedule optimization
//!
//! Command-line interface for searching minimum-cost pump schedules and
//! for evaluating individual schedules against a network.

mod report;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aquabound_core::{HydraulicOracle, NetworkBounds, SearchOptions};
use aquabound_oracle::AnalyticNetwork;
use aquabound_solver::{evaluate_schedule, solve, solve_with_factory, SolveOutcome};

#[derive(Parser)]
#[command(name = "aquabound")]
#[command(author, version, about = "Branch-and-bound pump scheduling", long_about = None)]
#[command(disable_help_flag = true)]
struct Cli {
    /// Network descriptor file
    #[arg(short = 'i', long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Positional alternative to --input
    #[arg(value_name = "INPUT", conflicts_with = "input")]
    input_pos: Option<PathBuf>,

    /// Schedule horizon in hours
    #[arg(short = 'h', long = "h_max", default_value_t = 24)]
    h_max: usize,

    /// Maximum off-to-on transitions per pump
    #[arg(short = 'a', long = "max_actuations", default_value_t = 3)]
    max_actuations: usize,

    /// Deepest hour a subtree may start at and still be handed off
    #[arg(short = 't', long = "h_threshold", default_value_t = 18)]
    h_threshold: usize,

    /// Worker thread count (defaults to available parallelism)
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Hydraulic engine backing the search
    #[arg(long, value_enum, default_value = "analytic")]
    engine: Engine,

    /// JSON bounds file (defaults to the built-in benchmark bounds)
    #[arg(long, value_name = "PATH")]
    bounds: Option<PathBuf>,

    /// Evaluate one aggregate schedule (comma-separated pump counts)
    /// instead of searching
    #[arg(long, value_name = "CSV")]
    evaluate_y: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Write logs to a timestamped file instead of stderr
    #[arg(short = 'l', long)]
    log: bool,

    /// Save network state after feasible full-horizon evaluations
    #[arg(short = 's', long)]
    save: bool,

    /// Write merged statistics JSON to this file
    #[arg(long, value_name = "PATH")]
    stats: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// Print help (the short -h belongs to --h_max)
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Engine {
    /// Built-in closed-form three-tank model
    Analytic,
    /// EPANET network files (requires the `epanet` build feature)
    Epanet,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log)?;

    let bounds = match &cli.bounds {
        Some(path) => NetworkBounds::from_json_file(path)?,
        None => NetworkBounds::any_town(),
    };
    let mut options = SearchOptions::default()
        .with_h_max(cli.h_max)
        .with_max_actuations(cli.max_actuations)
        .with_h_threshold(cli.h_threshold);
    options.workers = cli.workers;
    options.save_network = cli.save;

    let input = cli.input.clone().or_else(|| cli.input_pos.clone());

    if let Some(csv) = &cli.evaluate_y {
        let schedule = parse_schedule(csv)?;
        return run_evaluate(&cli, input.as_deref(), &bounds, &options, &schedule);
    }
    run_search(&cli, input.as_deref(), &bounds, &options)
}

fn init_tracing(verbose: bool, log_to_file: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    if log_to_file {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = format!("aquabound_{stamp}.log");
        let file = std::fs::File::create(&path)
            .with_context(|| format!("cannot create log file {path}"))?;
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
            .with(filter)
            .init();
        eprintln!("logging to {path}");
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
    Ok(())
}

/// Parse a comma-separated aggregate schedule like `1,2,1,0`.
fn parse_schedule(csv: &str) -> Result<Vec<u32>> {
    csv.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .with_context(|| format!("invalid pump count '{part}' in schedule"))
        })
        .collect()
}

fn run_search(
    cli: &Cli,
    input: Option<&std::path::Path>,
    bounds: &NetworkBounds,
    options: &SearchOptions,
) -> Result<()> {
    let outcome = match cli.engine {
        Engine::Analytic => match input {
            Some(path) => solve::<AnalyticNetwork>(path, bounds, options)?,
            None => {
                solve_with_factory(|| Ok(AnalyticNetwork::builtin()), bounds, options)?
            }
        },
        Engine::Epanet => solve_epanet(input, bounds, options)?,
    };

    if let Some(path) = &cli.stats {
        write_stats(path, &outcome)?;
    }
    match cli.format {
        Format::Text => print!("{}", report::search_text(bounds, options, &outcome)),
        Format::Json => println!("{}", report::search_json(options, &outcome)),
    }
    Ok(())
}

fn run_evaluate(
    cli: &Cli,
    input: Option<&std::path::Path>,
    bounds: &NetworkBounds,
    options: &SearchOptions,
    schedule: &[u32],
) -> Result<()> {
    let evaluation = match cli.engine {
        Engine::Analytic => match input {
            Some(path) => {
                let path = path.to_path_buf();
                evaluate_schedule(
                    move || AnalyticNetwork::open(&path),
                    bounds,
                    options,
                    schedule,
                )?
            }
            None => evaluate_schedule(
                || Ok(AnalyticNetwork::builtin()),
                bounds,
                options,
                schedule,
            )?,
        },
        Engine::Epanet => evaluate_epanet(input, bounds, options, schedule)?,
    };

    match cli.format {
        Format::Text => print!("{}", report::evaluation_text(&evaluation)),
        Format::Json => println!("{}", report::evaluation_json(&evaluation)),
    }
    Ok(())
}

#[cfg(feature = "epanet")]
fn solve_epanet(
    input: Option<&std::path::Path>,
    bounds: &NetworkBounds,
    options: &SearchOptions,
) -> Result<SolveOutcome> {
    let path = input.context("the epanet engine needs a network file (-i/--input)")?;
    Ok(solve::<aquabound_oracle::EpanetOracle>(path, bounds, options)?)
}

#[cfg(not(feature = "epanet"))]
fn solve_epanet(
    _input: Option<&std::path::Path>,
    _bounds: &NetworkBounds,
    _options: &SearchOptions,
) -> Result<SolveOutcome> {
    anyhow::bail!("this build has no EPANET support; rebuild with --features epanet")
}

#[cfg(feature = "epanet")]
fn evaluate_epanet(
    input: Option<&std::path::Path>,
    bounds: &NetworkBounds,
    options: &SearchOptions,
    schedule: &[u32],
) -> Result<aquabound_solver::ScheduleEvaluation> {
    let path = input
        .context("the epanet engine needs a network file (-i/--input)")?
        .to_path_buf();
    Ok(evaluate_schedule(
        move || aquabound_oracle::EpanetOracle::open(&path),
        bounds,
        options,
        schedule,
    )?)
}

#[cfg(not(feature = "epanet"))]
fn evaluate_epanet(
    _input: Option<&std::path::Path>,
    _bounds: &NetworkBounds,
    _options: &SearchOptions,
    _schedule: &[u32],
) -> Result<aquabound_solver::ScheduleEvaluation> {
    anyhow::bail!("this build has no EPANET support; rebuild with --features epanet")
}

fn write_stats(path: &std::path::Path, outcome: &SolveOutcome) -> Result<()> {
    let text = serde_json::to_string_pretty(&outcome.stats.to_json())?;
    std::fs::write(path, text)
        .with_context(|| format!("cannot write statistics to {}", path.display()))?;
    tracing::info!(path = %path.display(), "statistics written");
    Ok(())
}
