//! Local search driver.
//!
//! One worker owns one counter and one evaluator and walks its subtree
//! depth-first, recording statistics and tracking the best complete
//! schedule it has seen. Workers never talk to each other here; all
//! cooperation happens at the synchronization points in `sync`.

use aquabound_core::{HydraulicOracle, Incumbent, OracleError, PruneReason};
use tracing::{debug, info};

use crate::counter::{ScheduleCounter, WorkPackage};
use crate::evaluator::NodeEvaluator;
use crate::stats::SearchStats;

pub struct Worker<O, F>
where
    O: HydraulicOracle,
    F: Fn() -> Result<O, OracleError>,
{
    rank: usize,
    counter: ScheduleCounter,
    evaluator: NodeEvaluator<O, F>,
    stats: SearchStats,
    /// Best cost this worker knows of, local or adopted
    cost_ub: f64,
    best: Option<Incumbent>,
    /// Verdict of the last evaluated node, feeds the next `advance`
    feasible: bool,
    done: bool,
    iterations: u64,
}

impl<O, F> Worker<O, F>
where
    O: HydraulicOracle,
    F: Fn() -> Result<O, OracleError>,
{
    /// `active` is true only for the worker seeded with the full tree;
    /// everyone else starts done and waits to steal.
    pub fn new(
        rank: usize,
        counter: ScheduleCounter,
        evaluator: NodeEvaluator<O, F>,
        active: bool,
    ) -> Self {
        let stats = SearchStats::new(counter.h_max());
        Self {
            rank,
            counter,
            evaluator,
            stats,
            cost_ub: f64::INFINITY,
            best: None,
            feasible: true,
            done: !active,
            iterations: 0,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn done(&self) -> bool {
        self.done
    }

    pub fn cost_ub(&self) -> f64 {
        self.cost_ub
    }

    pub fn best(&self) -> Option<&Incumbent> {
        self.best.as_ref()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn stats_mut(&mut self) -> &mut SearchStats {
        &mut self.stats
    }

    /// Mark this worker finished regardless of remaining work. Used when
    /// an oracle failure aborts the run.
    pub fn force_done(&mut self) {
        self.done = true;
    }

    /// One iteration of the local search loop: advance the counter,
    /// materialize, evaluate, record.
    pub fn step(&mut self) -> Result<(), OracleError> {
        if self.done {
            return Ok(());
        }
        self.iterations += 1;

        if !self.counter.advance(self.feasible) {
            self.done = true;
            debug!(rank = self.rank, iterations = self.iterations, "subtree exhausted");
            return Ok(());
        }

        if !self.counter.materialize() {
            self.stats.record_prune(PruneReason::Actuations, self.counter.h());
            self.feasible = false;
            return Ok(());
        }

        let eval = self.evaluator.evaluate(&self.counter, self.cost_ub)?;
        self.feasible = eval.feasible;
        if eval.jump_to_end {
            self.counter.jump_to_end();
        }

        let h = self.counter.h();
        if let Some(reason) = eval.prune {
            self.stats.record_prune(reason, h);
            return Ok(());
        }

        self.stats.record_feasible(h);
        if h == self.counter.h_max() && eval.cost < self.cost_ub {
            self.update_incumbent(eval.cost);
        }
        Ok(())
    }

    fn update_incumbent(&mut self, cost: f64) {
        assert!(
            cost <= self.cost_ub,
            "incumbent went backwards: {} > {}",
            cost,
            self.cost_ub
        );
        info!(rank = self.rank, cost, "new incumbent");
        self.cost_ub = cost;
        self.best = Some(Incumbent {
            cost,
            y: self.counter.y().to_vec(),
            x: self.counter.x().to_vec(),
            num_pumps: self.counter.num_pumps(),
        });
    }

    /// Adopt a better schedule gossiped by a peer.
    pub fn adopt_incumbent(&mut self, incumbent: &Incumbent) {
        if incumbent.cost < self.cost_ub {
            self.cost_ub = incumbent.cost;
            self.best = Some(incumbent.clone());
        }
    }

    /// Hand-off level for stealing; meaningless when done.
    pub fn free_level(&mut self) -> usize {
        self.counter.free_level()
    }

    /// Snapshot the subtree at the current hand-off root and step past it
    /// locally. After this the worker never re-enters the shipped slice.
    pub fn ship_work(&mut self) -> WorkPackage {
        let package = self.counter.snapshot(self.feasible);
        self.counter.rewind_to_root();
        self.feasible = false;
        self.stats.record_prune(PruneReason::Split, self.counter.h());
        debug!(rank = self.rank, h_min = package.h_min, h_cut = package.h_cut, "subtree shipped");
        package
    }

    /// Take over a shipped subtree.
    pub fn receive_work(&mut self, package: &WorkPackage) {
        self.counter.restore(package);
        self.feasible = package.feasible;
        self.done = false;
        debug!(rank = self.rank, h_min = package.h_min, "subtree received");
    }

    /// Post-hand-off invariant: the sender sits at its root.
    pub fn at_root(&self) -> bool {
        self.counter.h() == self.counter.h_min()
    }

    pub fn counter(&self) -> &ScheduleCounter {
        &self.counter
    }

    /// Tear down into the pieces the merge step needs.
    pub fn into_report(self) -> (SearchStats, Option<Incumbent>, u64) {
        (self.stats, self.best, self.iterations)
    }
}
