//! # aquabound-solver
//!
//! Parallel branch-and-bound search over hourly pump schedules.
//!
//! This crate provides:
//! - Depth-first enumeration of aggregate schedules with canonical
//!   per-pump materialization ([`ScheduleCounter`])
//! - Hydraulic feasibility and cost pruning ([`BoundsChecker`],
//!   [`NodeEvaluator`])
//! - Symmetric workers with incumbent gossip and subtree stealing
//!   ([`Worker`], [`SyncGroup`])
//! - The top-level [`solve`] entry points and per-hour statistics
//!
//! ## Example
//!
//! ```rust
//! use aquabound_core::{NetworkBounds, SearchOptions};
//! use aquabound_oracle::AnalyticNetwork;
//! use aquabound_solver::solve_with_factory;
//!
//! let bounds = NetworkBounds::any_town();
//! let options = SearchOptions::default()
//!     .with_h_max(3)
//!     .with_workers(2);
//! let outcome = solve_with_factory(
//!     || Ok(AnalyticNetwork::builtin()),
//!     &bounds,
//!     &options,
//! )
//! .unwrap();
//! assert!(outcome.iterations > 0);
//! ```

mod constraints;
mod counter;
mod evaluator;
mod solve;
mod stats;
mod sync;
mod worker;

pub use constraints::BoundsChecker;
pub use counter::{ScheduleCounter, WorkPackage};
pub use evaluator::{Evaluation, NodeEvaluator};
pub use solve::{
    evaluate_schedule, solve, solve_with_factory, ScheduleEvaluation, SolveOutcome,
};
pub use stats::SearchStats;
pub use sync::{plan_transfers, CycleOutcome, SyncGroup};
pub use worker::Worker;
