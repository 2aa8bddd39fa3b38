//! Top-level search orchestration.
//!
//! Spawns one OS thread per worker, seeds worker 0 with the full tree,
//! interleaves local search steps with synchronization cycles, and merges
//! the per-worker reports when the tree is exhausted.

use aquabound_core::{
    HydraulicOracle, Incumbent, NetworkBounds, OracleError, PruneReason, SearchOptions,
    SolverError,
};
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};

use crate::constraints::BoundsChecker;
use crate::counter::ScheduleCounter;
use crate::evaluator::NodeEvaluator;
use crate::stats::SearchStats;
use crate::sync::{CycleOutcome, SyncGroup};
use crate::worker::Worker;

/// Result of a finished search.
#[derive(Clone, Debug)]
pub struct SolveOutcome {
    /// The minimum-cost schedule, or `None` when nothing was feasible
    pub incumbent: Option<Incumbent>,
    /// Merged per-hour statistics of all workers
    pub stats: SearchStats,
    /// Total local search iterations across workers
    pub iterations: u64,
    /// Worker count actually used
    pub workers: usize,
}

/// Verdict of a single installed schedule.
#[derive(Clone, Debug)]
pub struct ScheduleEvaluation {
    pub feasible: bool,
    pub cost: f64,
    pub prune: Option<PruneReason>,
    /// The materialized schedule, when the aggregate vector survived the
    /// actuation cap
    pub schedule: Option<Incumbent>,
}

/// Search with oracles opened from a network descriptor file.
pub fn solve<O: HydraulicOracle>(
    path: &Path,
    bounds: &NetworkBounds,
    options: &SearchOptions,
) -> Result<SolveOutcome, SolverError> {
    let path = path.to_path_buf();
    solve_with_factory(move || O::open(&path), bounds, options)
}

/// Search with an arbitrary oracle factory. The factory is invoked once
/// per candidate evaluation, plus once up front to resolve element names.
pub fn solve_with_factory<O, F>(
    factory: F,
    bounds: &NetworkBounds,
    options: &SearchOptions,
) -> Result<SolveOutcome, SolverError>
where
    O: HydraulicOracle,
    F: Fn() -> Result<O, OracleError> + Send + Sync,
{
    bounds.validate()?;

    // Resolve names once; workers share the index table. A failure here is
    // a configuration problem and must surface before any thread starts.
    let mut probe = factory()?;
    let checker = BoundsChecker::resolve(bounds, &mut probe)?;
    drop(probe);

    let workers = options
        .workers
        .unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        })
        .max(1);
    info!(workers, h_max = options.h_max, "starting branch-and-bound search");

    let sync = SyncGroup::new(workers);
    let start = Instant::now();

    let reports: Vec<WorkerReport> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|rank| {
                let factory = &factory;
                let sync = &sync;
                let checker = checker.clone();
                scope.spawn(move || run_worker(rank, factory, checker, options, sync))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(report) => report,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });

    let mut stats = SearchStats::new(options.h_max);
    let mut incumbent: Option<Incumbent> = None;
    let mut iterations = 0;
    let mut first_error = None;
    for report in reports {
        stats.merge(&report.stats);
        iterations += report.iterations;
        if let Some(best) = report.best {
            if incumbent.as_ref().map_or(true, |cur| best.cost < cur.cost) {
                incumbent = Some(best);
            }
        }
        if first_error.is_none() {
            first_error = report.error;
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    stats.duration_secs = start.elapsed().as_secs_f64();

    info!(
        iterations,
        cost = incumbent.as_ref().map_or(f64::INFINITY, |i| i.cost),
        "search finished"
    );
    Ok(SolveOutcome { incumbent, stats, iterations, workers })
}

struct WorkerReport {
    stats: SearchStats,
    best: Option<Incumbent>,
    iterations: u64,
    error: Option<SolverError>,
}

fn run_worker<O, F>(
    rank: usize,
    factory: &F,
    checker: BoundsChecker,
    options: &SearchOptions,
    sync: &SyncGroup,
) -> WorkerReport
where
    O: HydraulicOracle,
    F: Fn() -> Result<O, OracleError>,
{
    let counter = ScheduleCounter::new(
        options.h_max,
        checker.num_pumps(),
        options.max_actuations,
    );
    let evaluator = NodeEvaluator::new(factory, checker, options.save_network);
    let mut worker = Worker::new(rank, counter, evaluator, rank == 0);
    let mut error: Option<SolverError> = None;

    loop {
        if let Err(e) = worker.step() {
            error!(rank, error = %e, "oracle failure, aborting search");
            // Drain through the protocol: everyone leaves on the same cycle
            sync.raise_abort();
            worker.force_done();
            if error.is_none() {
                error = Some(e.into());
            }
        }
        match sync.exchange(&mut worker, options.h_threshold) {
            CycleOutcome::Continue => {}
            CycleOutcome::AllDone | CycleOutcome::Aborted => break,
        }
    }

    info!(rank, iterations = worker.iterations(), cost_ub = worker.cost_ub(), "worker finished");
    let (stats, best, iterations) = worker.into_report();
    WorkerReport { stats, best, iterations, error }
}

/// Evaluate one complete aggregate schedule end to end: materialize it
/// canonically, simulate the full horizon, classify.
pub fn evaluate_schedule<O, F>(
    factory: F,
    bounds: &NetworkBounds,
    options: &SearchOptions,
    schedule: &[u32],
) -> Result<ScheduleEvaluation, SolverError>
where
    O: HydraulicOracle,
    F: Fn() -> Result<O, OracleError>,
{
    bounds.validate()?;
    if schedule.len() != options.h_max && schedule.len() != options.h_max + 1 {
        return Err(SolverError::Config(format!(
            "schedule has {} hours, horizon is {}",
            schedule.len(),
            options.h_max
        )));
    }

    let mut probe = factory()?;
    let checker = BoundsChecker::resolve(bounds, &mut probe)?;
    drop(probe);

    let mut counter = ScheduleCounter::new(
        options.h_max,
        checker.num_pumps(),
        options.max_actuations,
    );
    if !counter.set_y(schedule) {
        return Ok(ScheduleEvaluation {
            feasible: false,
            cost: 0.0,
            prune: Some(PruneReason::Actuations),
            schedule: None,
        });
    }

    let evaluator = NodeEvaluator::new(&factory, checker, options.save_network);
    let eval = evaluator.evaluate(&counter, f64::INFINITY)?;
    let materialized = Incumbent {
        cost: eval.cost,
        y: counter.y().to_vec(),
        x: counter.x().to_vec(),
        num_pumps: counter.num_pumps(),
    };
    Ok(ScheduleEvaluation {
        feasible: eval.feasible,
        cost: eval.cost,
        prune: eval.prune,
        schedule: Some(materialized),
    })
}
