//! Report rendering.
//!
//! Plain-text and JSON renderings of search outcomes and single-schedule
//! evaluations. Text output is line oriented so it pipes cleanly.

use aquabound_core::{Incumbent, NetworkBounds, SearchOptions};
use aquabound_solver::{ScheduleEvaluation, SolveOutcome};
use std::fmt::Write;

fn schedule_table(out: &mut String, incumbent: &Incumbent) {
    let _ = writeln!(out, "{:>5} {:>3}  pumps", "hour", "y");
    for h in 1..incumbent.y.len() {
        let row: Vec<String> = incumbent
            .x_row(h)
            .iter()
            .map(std::string::ToString::to_string)
            .collect();
        let _ = writeln!(out, "{h:>5} {:>3}  [{}]", incumbent.y[h], row.join(" "));
    }
}

pub fn search_text(
    bounds: &NetworkBounds,
    options: &SearchOptions,
    outcome: &SolveOutcome,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "aquabound search");
    let _ = writeln!(
        out,
        "  horizon: {}h, actuation cap: {}, hand-off threshold: {}h, workers: {}",
        options.h_max, options.max_actuations, options.h_threshold, outcome.workers
    );
    let _ = writeln!(
        out,
        "  pumps: [{}], iterations: {}",
        bounds.pumps.join(", "),
        outcome.iterations
    );

    match &outcome.incumbent {
        Some(incumbent) => {
            let _ = writeln!(out, "minimum cost: {:.2}", incumbent.cost);
            schedule_table(&mut out, incumbent);
        }
        None => {
            let _ = writeln!(out, "no feasible schedule");
        }
    }
    let _ = writeln!(out);
    let _ = write!(out, "{}", outcome.stats);
    out
}

pub fn search_json(options: &SearchOptions, outcome: &SolveOutcome) -> String {
    let incumbent = outcome.incumbent.as_ref().map(|incumbent| {
        let x_rows: Vec<Vec<u8>> = (0..incumbent.y.len())
            .map(|h| incumbent.x_row(h).to_vec())
            .collect();
        serde_json::json!({
            "cost": incumbent.cost,
            "y": incumbent.y,
            "x": x_rows,
        })
    });
    serde_json::json!({
        "h_max": options.h_max,
        "max_actuations": options.max_actuations,
        "workers": outcome.workers,
        "iterations": outcome.iterations,
        "schedule": incumbent,
        "stats": outcome.stats.to_json(),
    })
    .to_string()
}

pub fn evaluation_text(evaluation: &ScheduleEvaluation) -> String {
    let mut out = String::new();
    if evaluation.feasible {
        let _ = writeln!(out, "feasible, cost: {:.2}", evaluation.cost);
    } else {
        match evaluation.prune {
            Some(reason) => {
                let _ = writeln!(out, "infeasible ({reason}), cost so far: {:.2}", evaluation.cost);
            }
            None => {
                let _ = writeln!(out, "infeasible, cost so far: {:.2}", evaluation.cost);
            }
        }
    }
    if let Some(schedule) = &evaluation.schedule {
        schedule_table(&mut out, schedule);
    }
    out
}

pub fn evaluation_json(evaluation: &ScheduleEvaluation) -> String {
    let schedule = evaluation.schedule.as_ref().map(|schedule| {
        let x_rows: Vec<Vec<u8>> = (0..schedule.y.len())
            .map(|h| schedule.x_row(h).to_vec())
            .collect();
        serde_json::json!({ "y": schedule.y, "x": x_rows })
    });
    serde_json::json!({
        "feasible": evaluation.feasible,
        "cost": evaluation.cost,
        "prune": evaluation.prune.map(|reason| reason.to_string()),
        "schedule": schedule,
    })
    .to_string()
}
