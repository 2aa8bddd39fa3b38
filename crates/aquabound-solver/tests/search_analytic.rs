//! End-to-end search tests on the analytic network.
//!
//! The analytic model is cheap enough to enumerate small horizons
//! exhaustively, so the branch-and-bound result can be cross-checked
//! against ground truth, and single-worker runs against multi-worker runs.

use aquabound_core::{NetworkBounds, SearchOptions};
use aquabound_oracle::{AnalyticNetwork, ScriptedOracle};
use aquabound_solver::{evaluate_schedule, solve_with_factory};

fn analytic() -> impl Fn() -> Result<AnalyticNetwork, aquabound_core::OracleError> + Send + Sync + Clone
{
    || Ok(AnalyticNetwork::builtin())
}

fn options(h_max: usize, workers: usize) -> SearchOptions {
    SearchOptions::default()
        .with_h_max(h_max)
        .with_h_threshold(h_max)
        .with_workers(workers)
}

/// Minimum cost over every aggregate schedule of the horizon, by
/// exhaustive enumeration through the same canonical materialization the
/// search uses.
fn brute_force_minimum(h_max: usize) -> Option<f64> {
    let bounds = NetworkBounds::any_town();
    let options = options(h_max, 1);
    let num_pumps = bounds.num_pumps() as u32;

    let mut best: Option<f64> = None;
    let combos = (u64::from(num_pumps) + 1).pow(h_max as u32);
    for combo in 0..combos {
        let mut y = Vec::with_capacity(h_max);
        let mut rest = combo;
        for _ in 0..h_max {
            y.push((rest % u64::from(num_pumps + 1)) as u32);
            rest /= u64::from(num_pumps + 1);
        }
        let eval = evaluate_schedule(analytic(), &bounds, &options, &y).unwrap();
        if eval.feasible && best.map_or(true, |b| eval.cost < b) {
            best = Some(eval.cost);
        }
    }
    best
}

#[test]
fn single_worker_finds_the_exhaustive_minimum() {
    let bounds = NetworkBounds::any_town();
    let outcome = solve_with_factory(analytic(), &bounds, &options(4, 1)).unwrap();
    let expected = brute_force_minimum(4).expect("a feasible 4-hour schedule exists");

    let incumbent = outcome.incumbent.expect("search should find a schedule");
    assert!((incumbent.cost - expected).abs() < 1e-9);
}

#[test]
fn worker_count_does_not_change_the_minimum() {
    let bounds = NetworkBounds::any_town();
    let single = solve_with_factory(analytic(), &bounds, &options(5, 1)).unwrap();
    let multi = solve_with_factory(analytic(), &bounds, &options(5, 4)).unwrap();

    let single_cost = single.incumbent.expect("feasible schedule").cost;
    let multi_cost = multi.incumbent.expect("feasible schedule").cost;
    assert!((single_cost - multi_cost).abs() < 1e-9);
    assert_eq!(multi.workers, 4);
}

#[test]
fn incumbent_satisfies_schedule_invariants() {
    let bounds = NetworkBounds::any_town();
    let opts = options(4, 2);
    let outcome = solve_with_factory(analytic(), &bounds, &opts).unwrap();
    let incumbent = outcome.incumbent.expect("feasible schedule");

    // Row sums match the aggregate counts
    for h in 0..=4 {
        let sum: u32 = incumbent.x_row(h).iter().map(|&v| u32::from(v)).sum();
        assert_eq!(sum, incumbent.y[h], "hour {h}");
    }
    // Actuation cap holds on the final schedule
    for (pump, count) in incumbent.actuations().iter().enumerate() {
        assert!(
            *count <= opts.max_actuations,
            "pump {pump} actuated {count} times"
        );
    }
}

#[test]
fn empty_horizon_terminates_immediately() {
    let bounds = NetworkBounds::any_town();
    let outcome = solve_with_factory(analytic(), &bounds, &options(0, 2)).unwrap();
    assert!(outcome.incumbent.is_none());
    assert_eq!(outcome.stats.total_feasible(), 0);
}

#[test]
fn actuation_cap_zero_leaves_only_the_idle_schedule() {
    // With no actuations allowed nothing can ever switch on, and an idle
    // network drains its tanks below the stability line
    let bounds = NetworkBounds::any_town();
    let opts = SearchOptions::default()
        .with_h_max(3)
        .with_max_actuations(0)
        .with_workers(1);
    let outcome = solve_with_factory(analytic(), &bounds, &opts).unwrap();
    assert!(outcome.incumbent.is_none());
}

#[test]
fn search_statistics_account_for_activity() {
    let bounds = NetworkBounds::any_town();
    let outcome = solve_with_factory(analytic(), &bounds, &options(4, 1)).unwrap();
    assert!(outcome.iterations > 0);
    assert!(outcome.stats.total_feasible() > 0);
    assert!(outcome.stats.duration_secs >= 0.0);
}

#[test]
fn known_night_schedule_evaluates_to_its_tariff_cost() {
    // One pump through six night-tariff hours: 6 * 40 kW * 0.0244
    let bounds = NetworkBounds::any_town();
    let opts = options(6, 1);
    let eval = evaluate_schedule(analytic(), &bounds, &opts, &[1, 1, 1, 1, 1, 1]).unwrap();

    assert!(eval.feasible, "prune: {:?}", eval.prune);
    assert!((eval.cost - 6.0 * 40.0 * 0.0244).abs() < 1e-9);

    let schedule = eval.schedule.expect("materialized schedule");
    assert_eq!(schedule.y[1..], [1, 1, 1, 1, 1, 1]);
    // Single canonical pump carries the whole schedule
    assert_eq!(schedule.x_row(1), &[1, 0, 0]);
    assert_eq!(schedule.x_row(6), &[1, 0, 0]);
}

#[test]
fn evaluate_schedule_rejects_wrong_horizon() {
    let bounds = NetworkBounds::any_town();
    let opts = options(6, 1);
    assert!(evaluate_schedule(analytic(), &bounds, &opts, &[1, 1]).is_err());
}

#[test]
fn evaluate_schedule_reports_actuation_failures() {
    let bounds = NetworkBounds::any_town();
    let opts = SearchOptions::default().with_h_max(3).with_max_actuations(0);
    let eval = evaluate_schedule(analytic(), &bounds, &opts, &[1, 0, 0]).unwrap();
    assert!(!eval.feasible);
    assert_eq!(eval.prune, Some(aquabound_core::PruneReason::Actuations));
    assert!(eval.schedule.is_none());
}

#[test]
fn oracle_failure_aborts_the_whole_search() {
    // A scripted oracle with no steps fails on the very first run_step
    let bounds = NetworkBounds::any_town();
    let factory = || Ok(ScriptedOracle::new(Vec::new()));
    let result = solve_with_factory(factory, &bounds, &options(3, 2));
    assert!(result.is_err());
}
