//! EPANET adapter.
//!
//! Wraps the `epanet` bindings (EPANET 2.3) behind the `HydraulicOracle`
//! contract. One `EpanetOracle` owns one loaded project; the project is
//! closed and deleted when the oracle drops.
//!
//! EPANET reports instantaneous pump energy (kW) rather than a cumulative
//! cost, so `advance_step` integrates `EN_ENERGY` against the global
//! energy price and price pattern over each step, the same quantity the
//! engine's own energy report tabulates.

use aquabound_core::{
    HydraulicOracle, NodeIndex, NodeQuantity, OracleError, PumpIndex, SimTime,
};
use epanet::types::{CountType, InitHydOption, LinkProperty, NodeProperty, Option as EnOption};
use epanet::{EPANET, EPANETError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

fn engine(op: &'static str) -> impl Fn(EPANETError) -> OracleError {
    move |e| OracleError::engine(op, e.to_string())
}

/// Hydraulic oracle backed by a real EPANET project.
pub struct EpanetOracle {
    project: EPANET,
    path: PathBuf,
    time: SimTime,
    global_price: f64,
    price_pattern: i32,
    /// Speed pattern index per pump link, created on demand
    speed_patterns: HashMap<PumpIndex, i32>,
    /// Cumulative integrated cost per pump whose speed we control
    costs: HashMap<PumpIndex, f64>,
}

impl EpanetOracle {
    /// Pattern index driving `pump`'s speed, creating one if the network
    /// file did not assign any.
    fn speed_pattern(&mut self, pump: PumpIndex) -> Result<i32, OracleError> {
        if let Some(&idx) = self.speed_patterns.get(&pump) {
            return Ok(idx);
        }
        let mut idx = self
            .project
            .get_link_value(pump, LinkProperty::LinkPattern)
            .map_err(engine("get speed pattern"))? as i32;
        if idx == 0 {
            self.project
                .add_pattern(&format!("aqb-speed-{pump}"))
                .map_err(engine("add speed pattern"))?;
            idx = self
                .project
                .get_count(CountType::PatternCount)
                .map_err(engine("count patterns"))?;
            self.project
                .set_link_value(pump, LinkProperty::LinkPattern, f64::from(idx))
                .map_err(engine("assign speed pattern"))?;
        }
        self.speed_patterns.insert(pump, idx);
        Ok(idx)
    }

    /// Energy price factor in effect at the current simulated time.
    fn price_factor(&mut self) -> Result<f64, OracleError> {
        if self.price_pattern <= 0 {
            return Ok(1.0);
        }
        let len = self
            .project
            .get_pattern_length(self.price_pattern)
            .map_err(engine("price pattern length"))?;
        if len == 0 {
            return Ok(1.0);
        }
        let period = ((self.time / 3600) as i32 % len) + 1;
        self.project
            .get_pattern_value(self.price_pattern, period)
            .map_err(engine("price pattern value"))
    }
}

impl HydraulicOracle for EpanetOracle {
    fn open(path: &Path) -> Result<Self, OracleError> {
        let inp = path.to_str().ok_or_else(|| OracleError::Parse {
            path: path.to_path_buf(),
            reason: "path is not valid UTF-8".into(),
        })?;
        if !path.exists() {
            return Err(OracleError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        let mut project = EPANET::new(inp, "", "").map_err(|e| OracleError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let global_price = project
            .get_option(EnOption::GlobalPrice)
            .map_err(engine("read global price"))?;
        let price_pattern = project
            .get_option(EnOption::GlobalPattern)
            .map_err(engine("read price pattern"))? as i32;
        Ok(Self {
            project,
            path: path.to_path_buf(),
            time: 0,
            global_price,
            price_pattern,
            speed_patterns: HashMap::new(),
            costs: HashMap::new(),
        })
    }

    fn init(&mut self) -> Result<(), OracleError> {
        self.project.open_h().map_err(engine("open hydraulics"))?;
        self.project
            .init_h(InitHydOption::InitFlow)
            .map_err(engine("init hydraulics"))?;
        self.time = 0;
        for cost in self.costs.values_mut() {
            *cost = 0.0;
        }
        Ok(())
    }

    fn node_index(&mut self, name: &str) -> Result<NodeIndex, OracleError> {
        self.project
            .get_node_index(name)
            .map_err(|_| OracleError::NotFound { name: name.to_string() })
    }

    fn pump_index(&mut self, name: &str) -> Result<PumpIndex, OracleError> {
        self.project
            .get_link_index(name)
            .map_err(|_| OracleError::NotFound { name: name.to_string() })
    }

    fn set_pump_speed(
        &mut self,
        pump: PumpIndex,
        period: usize,
        factor: f64,
    ) -> Result<(), OracleError> {
        let pattern = self.speed_pattern(pump)?;
        let len = self
            .project
            .get_pattern_length(pattern)
            .map_err(engine("pattern length"))?;
        if (len as usize) < period + 1 {
            // Grow the pattern to cover the new period
            let mut values = Vec::with_capacity(period + 1);
            for i in 1..=len {
                values.push(
                    self.project
                        .get_pattern_value(pattern, i)
                        .map_err(engine("pattern value"))?,
                );
            }
            values.resize(period + 1, 0.0);
            self.project
                .set_pattern(pattern, &values)
                .map_err(engine("grow pattern"))?;
        }
        self.project
            .set_pattern_value(pattern, (period + 1) as i32, factor)
            .map_err(engine("set pattern value"))?;
        self.costs.entry(pump).or_insert(0.0);
        Ok(())
    }

    fn run_step(&mut self) -> Result<SimTime, OracleError> {
        let t = self.project.run_h().map_err(engine("run hydraulics"))?;
        self.time = t;
        Ok(t)
    }

    fn advance_step(&mut self) -> Result<SimTime, OracleError> {
        // Energy draw at the state just computed applies over the step
        let mut draws = Vec::with_capacity(self.costs.len());
        for &pump in self.costs.keys() {
            let kw = self
                .project
                .get_link_value(pump, LinkProperty::Energy)
                .map_err(engine("read pump energy"))?;
            draws.push((pump, kw));
        }
        let factor = self.price_factor()?;
        let dt = self.project.next_h().map_err(engine("advance hydraulics"))?;
        if dt > 0 {
            let hours = dt as f64 / 3600.0;
            for (pump, kw) in draws {
                if let Some(cost) = self.costs.get_mut(&pump) {
                    *cost += kw * hours * self.global_price * factor;
                }
            }
        }
        self.time += dt;
        Ok(dt)
    }

    fn node_value(&mut self, node: NodeIndex, quantity: NodeQuantity) -> Result<f64, OracleError> {
        let property = match quantity {
            NodeQuantity::Pressure => NodeProperty::Pressure,
            NodeQuantity::Head => NodeProperty::Head,
        };
        self.project
            .get_node_value(node, property)
            .map_err(engine("read node value"))
    }

    fn pump_cost(&mut self, pump: PumpIndex) -> Result<f64, OracleError> {
        Ok(self.costs.get(&pump).copied().unwrap_or(0.0))
    }

    fn save(&mut self, path: &Path) -> Result<(), OracleError> {
        let out = path.to_str().ok_or_else(|| OracleError::Parse {
            path: path.to_path_buf(),
            reason: "path is not valid UTF-8".into(),
        })?;
        self.project
            .save_inp_file(out)
            .map_err(engine("save project"))
    }
}

impl std::fmt::Debug for EpanetOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpanetOracle")
            .field("path", &self.path)
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}
