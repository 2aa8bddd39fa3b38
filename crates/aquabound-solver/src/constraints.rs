//! Feasibility predicates over oracle state.
//!
//! A `BoundsChecker` resolves the monitored element names to oracle
//! indices once, then answers pure yes/no questions against whatever state
//! the oracle currently holds. The first failing predicate classifies the
//! prune, so evaluation order matters: pressures, then levels, then cost,
//! and tank stability only at the end of the horizon.

use aquabound_core::{
    HydraulicOracle, NetworkBounds, NodeIndex, NodeQuantity, OracleError, PumpIndex, TankBound,
};
use tracing::debug;

use crate::counter::ScheduleCounter;

/// Name, oracle index, and threshold data for every monitored element.
#[derive(Clone)]
pub struct BoundsChecker {
    nodes: Vec<(String, NodeIndex, f64)>,
    tanks: Vec<(String, NodeIndex, TankBound)>,
    pumps: Vec<(String, PumpIndex)>,
}

impl BoundsChecker {
    /// Resolve element names against an oracle instance. Indices are
    /// stable across instances of a deterministic oracle, so resolution
    /// happens once per worker, not per evaluation.
    pub fn resolve<O: HydraulicOracle>(
        bounds: &NetworkBounds,
        oracle: &mut O,
    ) -> Result<Self, OracleError> {
        let mut nodes = Vec::with_capacity(bounds.nodes.len());
        for bound in &bounds.nodes {
            let index = oracle.node_index(&bound.id)?;
            nodes.push((bound.id.clone(), index, bound.min_pressure));
        }
        let mut tanks = Vec::with_capacity(bounds.tanks.len());
        for bound in &bounds.tanks {
            let index = oracle.node_index(&bound.id)?;
            tanks.push((bound.id.clone(), index, bound.clone()));
        }
        let mut pumps = Vec::with_capacity(bounds.pumps.len());
        for name in &bounds.pumps {
            let index = oracle.pump_index(name)?;
            pumps.push((name.clone(), index));
        }
        Ok(Self { nodes, tanks, pumps })
    }

    pub fn num_pumps(&self) -> usize {
        self.pumps.len()
    }

    /// Install the committed rows of the counter's configuration into the
    /// pump speed patterns: hour `i` lands in pattern period `i - 1`.
    pub fn install_pattern<O: HydraulicOracle>(
        &self,
        oracle: &mut O,
        counter: &ScheduleCounter,
    ) -> Result<(), OracleError> {
        for hour in 1..=counter.h() {
            let row = counter.x_row(hour);
            for (pump, &(_, index)) in self.pumps.iter().enumerate() {
                oracle.set_pump_speed(index, hour - 1, f64::from(row[pump]))?;
            }
        }
        Ok(())
    }

    /// Every monitored junction at or above its pressure threshold?
    pub fn check_pressures<O: HydraulicOracle>(
        &self,
        oracle: &mut O,
    ) -> Result<bool, OracleError> {
        for (name, index, threshold) in &self.nodes {
            let pressure = oracle.node_value(*index, NodeQuantity::Pressure)?;
            if pressure < *threshold {
                debug!(node = %name, pressure, threshold, "pressure bound violated");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Every tank inside its level corridor?
    pub fn check_levels<O: HydraulicOracle>(&self, oracle: &mut O) -> Result<bool, OracleError> {
        for (name, index, bound) in &self.tanks {
            let head = oracle.node_value(*index, NodeQuantity::Head)?;
            if head < bound.level_min || head > bound.level_max {
                debug!(
                    tank = %name,
                    head,
                    corridor = ?(bound.level_min, bound.level_max),
                    "level bound violated"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Every tank back at or above its initial level? Only meaningful at
    /// the end of the horizon: it makes the schedule repeatable day over day.
    pub fn check_stability<O: HydraulicOracle>(&self, oracle: &mut O) -> Result<bool, OracleError> {
        for (name, index, bound) in &self.tanks {
            let head = oracle.node_value(*index, NodeQuantity::Head)?;
            if head < bound.initial_level {
                debug!(tank = %name, head, initial = bound.initial_level, "stability violated");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Cumulative pumping cost so far.
    pub fn current_cost<O: HydraulicOracle>(&self, oracle: &mut O) -> Result<f64, OracleError> {
        let mut cost = 0.0;
        for &(_, index) in &self.pumps {
            cost += oracle.pump_cost(index)?;
        }
        Ok(cost)
    }

    /// Still under the incumbent's cost?
    pub fn check_cost(&self, cost: f64, cost_ub: f64) -> bool {
        cost < cost_ub
    }
}
