//! Candidate evaluation.
//!
//! For a partial schedule committed up to hour `h`, install the pump
//! speeds into a fresh oracle, step it an hour at a time, and classify the
//! outcome: infeasible with a prune reason, or feasible with the cost so
//! far. Every evaluation starts from the network's initial state; the
//! oracle interface has no partial rewind, and re-running the prefix is
//! the correctness-preserving choice.

use aquabound_core::{HydraulicOracle, OracleError, PruneReason, SimTime, HOUR_SECS};
use chrono::Local;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing::trace;

use crate::constraints::BoundsChecker;
use crate::counter::ScheduleCounter;

/// Verdict of one candidate evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub feasible: bool,
    /// Cumulative cost at the last computed step
    pub cost: f64,
    pub prune: Option<PruneReason>,
    /// The rest of the current `y[h]` branch can be skipped. Set on cost
    /// prunes: cost only grows with simulated time, and at a fixed prefix
    /// it does not shrink when more pumps run, so deeper or richer
    /// siblings cannot come back under the bound.
    pub jump_to_end: bool,
}

impl Evaluation {
    fn pruned(reason: PruneReason, cost: f64) -> Self {
        Self {
            feasible: false,
            cost,
            prune: Some(reason),
            jump_to_end: reason == PruneReason::Cost,
        }
    }

    fn feasible(cost: f64) -> Self {
        Self { feasible: true, cost, prune: None, jump_to_end: false }
    }
}

/// Glue between counter, constraint checker, and oracle.
pub struct NodeEvaluator<O, F>
where
    O: HydraulicOracle,
    F: Fn() -> Result<O, OracleError>,
{
    factory: F,
    checker: BoundsChecker,
    /// Dump network state after feasible full-horizon evaluations
    save_network: bool,
    _oracle: PhantomData<O>,
}

impl<O, F> NodeEvaluator<O, F>
where
    O: HydraulicOracle,
    F: Fn() -> Result<O, OracleError>,
{
    pub fn new(factory: F, checker: BoundsChecker, save_network: bool) -> Self {
        Self { factory, checker, save_network, _oracle: PhantomData }
    }

    pub fn checker(&self) -> &BoundsChecker {
        &self.checker
    }

    /// Simulate the committed hours of `counter` and classify the result.
    ///
    /// Constraint order per step: pressures, levels, cost; tank stability
    /// once, at the full horizon. The first failure wins.
    pub fn evaluate(
        &self,
        counter: &ScheduleCounter,
        cost_ub: f64,
    ) -> Result<Evaluation, OracleError> {
        let mut oracle = (self.factory)()?;
        oracle.init()?;
        self.checker.install_pattern(&mut oracle, counter)?;

        let t_max: SimTime = counter.h() as SimTime * HOUR_SECS;
        let mut cost = 0.0;

        loop {
            let t = oracle.run_step()?;
            trace!(h = counter.h(), t, "hydraulic step");

            if !self.checker.check_pressures(&mut oracle)? {
                return Ok(Evaluation::pruned(PruneReason::Pressures, cost));
            }
            if !self.checker.check_levels(&mut oracle)? {
                return Ok(Evaluation::pruned(PruneReason::Levels, cost));
            }
            cost = self.checker.current_cost(&mut oracle)?;
            if !self.checker.check_cost(cost, cost_ub) {
                return Ok(Evaluation::pruned(PruneReason::Cost, cost));
            }

            if t >= t_max {
                break;
            }
            if oracle.advance_step()? == 0 {
                break;
            }
        }

        if counter.h() == counter.h_max() {
            if !self.checker.check_stability(&mut oracle)? {
                return Ok(Evaluation::pruned(PruneReason::Stability, cost));
            }
            if self.save_network {
                let stamp = Local::now().format("%Y%m%d_%H%M%S");
                let path = PathBuf::from(format!("schedule_{stamp}.net"));
                oracle.save(&path)?;
                tracing::info!(path = %path.display(), "network state saved");
            }
        }

        Ok(Evaluation::feasible(cost))
    }
}
