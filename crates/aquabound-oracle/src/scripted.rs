//! Replay oracle for tests.
//!
//! Serves preprogrammed pressures, tank heads, and cumulative cost, one
//! entry per simulated hour. Used to drive the evaluator and constraint
//! checker into specific classification paths without a network model.

use aquabound_core::{
    HydraulicOracle, NodeIndex, NodeQuantity, OracleError, PumpIndex, SimTime, HOUR_SECS,
};
use std::path::Path;

/// State served at one step boundary.
#[derive(Clone, Debug)]
pub struct ScriptedStep {
    /// Pressure per monitored junction
    pub pressures: Vec<f64>,
    /// Head per tank
    pub heads: Vec<f64>,
    /// Cumulative total pumping cost at this point
    pub cost: f64,
}

impl ScriptedStep {
    pub fn new(pressures: Vec<f64>, heads: Vec<f64>, cost: f64) -> Self {
        Self { pressures, heads, cost }
    }
}

/// Oracle that replays a fixed script. Step `i` is served while the
/// simulated time sits at `i` hours; an evaluation of depth `h` consumes
/// steps `0..=h`.
#[derive(Clone, Debug)]
pub struct ScriptedOracle {
    nodes: Vec<String>,
    tanks: Vec<String>,
    pumps: Vec<String>,
    steps: Vec<ScriptedStep>,
    time: SimTime,
    /// Installed speed factors, `(pump, period, factor)`, in call order
    pub installed: Vec<(PumpIndex, usize, f64)>,
}

impl ScriptedOracle {
    /// Script against the benchmark element names.
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            nodes: vec!["55".into(), "90".into(), "170".into()],
            tanks: vec!["65".into(), "165".into(), "265".into()],
            pumps: vec!["111".into(), "222".into(), "333".into()],
            steps,
            time: 0,
            installed: Vec::new(),
        }
    }

    pub fn with_names(
        mut self,
        nodes: Vec<String>,
        tanks: Vec<String>,
        pumps: Vec<String>,
    ) -> Self {
        self.nodes = nodes;
        self.tanks = tanks;
        self.pumps = pumps;
        self
    }

    fn current(&self) -> Result<&ScriptedStep, OracleError> {
        let idx = (self.time / HOUR_SECS) as usize;
        self.steps
            .get(idx)
            .ok_or_else(|| OracleError::engine("run_step", format!("script exhausted at step {idx}")))
    }
}

impl HydraulicOracle for ScriptedOracle {
    /// A scripted oracle has no file form; construct it directly instead.
    fn open(path: &Path) -> Result<Self, OracleError> {
        Err(OracleError::Parse {
            path: path.to_path_buf(),
            reason: "scripted oracle cannot be opened from a file".into(),
        })
    }

    fn init(&mut self) -> Result<(), OracleError> {
        self.time = 0;
        Ok(())
    }

    fn node_index(&mut self, name: &str) -> Result<NodeIndex, OracleError> {
        if let Some(j) = self.nodes.iter().position(|n| n == name) {
            return Ok((j + 1) as NodeIndex);
        }
        if let Some(i) = self.tanks.iter().position(|t| t == name) {
            return Ok((self.nodes.len() + i + 1) as NodeIndex);
        }
        Err(OracleError::NotFound { name: name.to_string() })
    }

    fn pump_index(&mut self, name: &str) -> Result<PumpIndex, OracleError> {
        self.pumps
            .iter()
            .position(|p| p == name)
            .map(|p| (p + 1) as PumpIndex)
            .ok_or_else(|| OracleError::NotFound { name: name.to_string() })
    }

    fn set_pump_speed(
        &mut self,
        pump: PumpIndex,
        period: usize,
        factor: f64,
    ) -> Result<(), OracleError> {
        self.installed.push((pump, period, factor));
        Ok(())
    }

    fn run_step(&mut self) -> Result<SimTime, OracleError> {
        self.current()?;
        Ok(self.time)
    }

    fn advance_step(&mut self) -> Result<SimTime, OracleError> {
        self.time += HOUR_SECS;
        if (self.time / HOUR_SECS) as usize >= self.steps.len() {
            return Ok(0);
        }
        Ok(HOUR_SECS)
    }

    fn node_value(&mut self, node: NodeIndex, quantity: NodeQuantity) -> Result<f64, OracleError> {
        let step = self.current()?;
        let idx = node as usize;
        if idx == 0 {
            return Err(OracleError::engine("node_value", format!("node index {node} out of range")));
        }
        if idx <= self.nodes.len() {
            // Junctions only serve pressure; a script has no elevations
            let _ = quantity;
            return Ok(step.pressures[idx - 1]);
        }
        let tank = idx - self.nodes.len() - 1;
        step.heads
            .get(tank)
            .copied()
            .ok_or_else(|| OracleError::engine("node_value", format!("node index {node} out of range")))
    }

    fn pump_cost(&mut self, pump: PumpIndex) -> Result<f64, OracleError> {
        // The whole scripted cost is booked on the first pump
        let step = self.current()?;
        Ok(if pump == 1 { step.cost } else { 0.0 })
    }

    fn save(&mut self, _path: &Path) -> Result<(), OracleError> {
        Ok(())
    }
}
