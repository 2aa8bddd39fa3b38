//! Hydraulic feasibility bounds.
//!
//! Names of monitored elements and their numeric thresholds. These are
//! configuration constants supplied at startup; the search resolves the
//! names to oracle indices once and then works with indices only.

use crate::SolverError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Minimum pressure requirement at a monitored junction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PressureBound {
    /// Node name in the network descriptor
    pub id: String,
    /// Lowest acceptable pressure
    pub min_pressure: f64,
}

/// Level corridor and stability reference for one tank.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TankBound {
    /// Tank node name in the network descriptor
    pub id: String,
    /// Lower edge of the admissible head corridor
    pub level_min: f64,
    /// Upper edge of the admissible head corridor
    pub level_max: f64,
    /// Head at the start of the horizon; a repeatable schedule must not end below it
    pub initial_level: f64,
}

/// Everything the constraint checker needs to know about the network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkBounds {
    /// Monitored junctions with their pressure thresholds
    pub nodes: Vec<PressureBound>,
    /// Tanks with their level corridors
    pub tanks: Vec<TankBound>,
    /// Controllable pumps, in schedule order
    pub pumps: Vec<String>,
}

impl NetworkBounds {
    /// The three-tank benchmark network the optimizer was developed against.
    pub fn any_town() -> Self {
        let corridor = |id: &str| TankBound {
            id: id.to_string(),
            level_min: 66.53,
            level_max: 71.53,
            initial_level: 66.93,
        };
        Self {
            nodes: vec![
                PressureBound { id: "55".into(), min_pressure: 42.0 },
                PressureBound { id: "90".into(), min_pressure: 51.0 },
                PressureBound { id: "170".into(), min_pressure: 30.0 },
            ],
            tanks: vec![corridor("65"), corridor("165"), corridor("265")],
            pumps: vec!["111".into(), "222".into(), "333".into()],
        }
    }

    pub fn num_pumps(&self) -> usize {
        self.pumps.len()
    }

    /// Load bounds from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, SolverError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SolverError::Config(format!("cannot read bounds file {}: {e}", path.display())))?;
        let bounds: NetworkBounds = serde_json::from_str(&text)
            .map_err(|e| SolverError::Config(format!("invalid bounds file {}: {e}", path.display())))?;
        bounds.validate()?;
        Ok(bounds)
    }

    /// Reject bounds no search could run against.
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.pumps.is_empty() {
            return Err(SolverError::Config("bounds list no pumps".into()));
        }
        for tank in &self.tanks {
            if tank.level_min > tank.level_max {
                return Err(SolverError::Config(format!(
                    "tank {}: level_min {} exceeds level_max {}",
                    tank.id, tank.level_min, tank.level_max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn any_town_preset() {
        let bounds = NetworkBounds::any_town();
        assert_eq!(bounds.num_pumps(), 3);
        assert_eq!(bounds.nodes.len(), 3);
        assert_eq!(bounds.tanks.len(), 3);
        assert_eq!(bounds.nodes[1].id, "90");
        assert_eq!(bounds.nodes[1].min_pressure, 51.0);
        assert_eq!(bounds.tanks[0].level_min, 66.53);
        assert_eq!(bounds.tanks[0].initial_level, 66.93);
        assert!(bounds.validate().is_ok());
    }

    #[test]
    fn json_round_trip() {
        let bounds = NetworkBounds::any_town();
        let text = serde_json::to_string(&bounds).unwrap();
        let back: NetworkBounds = serde_json::from_str(&text).unwrap();
        assert_eq!(back, bounds);
    }

    #[test]
    fn validate_rejects_empty_pumps() {
        let bounds = NetworkBounds { nodes: vec![], tanks: vec![], pumps: vec![] };
        assert!(bounds.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_corridor() {
        let mut bounds = NetworkBounds::any_town();
        bounds.tanks[0].level_min = 80.0;
        assert!(bounds.validate().is_err());
    }
}
