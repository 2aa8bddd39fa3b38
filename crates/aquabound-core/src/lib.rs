//! # aquabound-core
//!
//! Core domain model for the aquabound pump-scheduling optimizer.
//!
//! This crate provides:
//! - Domain types: `SearchOptions`, `NetworkBounds`, `Incumbent`, `PruneReason`
//! - The `HydraulicOracle` trait the search core drives
//! - Error types shared across the workspace
//!
//! ## Example
//!
//! ```rust
//! use aquabound_core::{NetworkBounds, SearchOptions};
//!
//! let bounds = NetworkBounds::any_town();
//! assert_eq!(bounds.num_pumps(), 3);
//!
//! let options = SearchOptions::default().with_h_max(24).with_max_actuations(3);
//! assert_eq!(options.h_threshold, 18);
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod bounds;

pub use bounds::{NetworkBounds, PressureBound, TankBound};

// ============================================================================
// Type Aliases
// ============================================================================

/// Oracle-side index of a junction node
pub type NodeIndex = i32;

/// Oracle-side index of a pump link
pub type PumpIndex = i32;

/// Seconds of simulated time
pub type SimTime = u64;

/// Seconds in one schedule hour
pub const HOUR_SECS: SimTime = 3600;

// ============================================================================
// Search Options
// ============================================================================

/// Parameters of one branch-and-bound run.
///
/// `h_max` is the schedule horizon in hours; hour indices run over
/// `1..=h_max` with index 0 reserved as the unused base. `max_actuations`
/// caps the number of off-to-on transitions per pump over the horizon.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Schedule horizon in hours
    pub h_max: usize,
    /// Maximum off-to-on transitions per pump
    pub max_actuations: usize,
    /// Deepest hour a subtree may start at and still be handed off
    pub h_threshold: usize,
    /// Worker count; `None` takes the machine's available parallelism
    pub workers: Option<usize>,
    /// Dump the network state after each feasible full-horizon evaluation
    pub save_network: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            h_max: 24,
            max_actuations: 3,
            h_threshold: 18,
            workers: None,
            save_network: false,
        }
    }
}

impl SearchOptions {
    pub fn with_h_max(mut self, h_max: usize) -> Self {
        self.h_max = h_max;
        self
    }

    pub fn with_max_actuations(mut self, max_actuations: usize) -> Self {
        self.max_actuations = max_actuations;
        self
    }

    pub fn with_h_threshold(mut self, h_threshold: usize) -> Self {
        self.h_threshold = h_threshold;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }
}

// ============================================================================
// Prune Reasons
// ============================================================================

/// Why a subtree was rejected without descending into it.
///
/// `Split` is bookkeeping rather than infeasibility: the subtree was handed
/// off to another worker and the sender records it as pruned locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PruneReason {
    /// Canonical extension would exceed the per-pump actuation cap
    Actuations,
    /// A monitored node fell below its pressure threshold
    Pressures,
    /// A tank left its level corridor
    Levels,
    /// A tank ended the horizon below its initial level
    Stability,
    /// Cumulative cost reached the incumbent's cost
    Cost,
    /// Subtree transferred to an idle worker
    Split,
}

impl PruneReason {
    /// All reasons, in reporting order.
    pub const ALL: [PruneReason; 6] = [
        PruneReason::Actuations,
        PruneReason::Pressures,
        PruneReason::Levels,
        PruneReason::Stability,
        PruneReason::Cost,
        PruneReason::Split,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PruneReason::Actuations => "actuations",
            PruneReason::Pressures => "pressures",
            PruneReason::Levels => "levels",
            PruneReason::Stability => "stability",
            PruneReason::Cost => "cost",
            PruneReason::Split => "split",
        }
    }
}

impl std::fmt::Display for PruneReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Incumbent
// ============================================================================

/// The best complete schedule found so far.
///
/// `y[h]` is the number of pumps running in hour `h`; `x` is the per-pump
/// on/off matrix stored flat, hour-major, with one row of `num_pumps`
/// entries per hour. Row 0 is the all-off base state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Incumbent {
    /// Total pumping cost of the schedule
    pub cost: f64,
    /// Pumps running per hour, length `h_max + 1`
    pub y: Vec<u32>,
    /// Flat on/off matrix, length `num_pumps * (h_max + 1)`
    pub x: Vec<u8>,
    /// Pumps per hour row
    pub num_pumps: usize,
}

impl Incumbent {
    /// The on/off row for hour `h`.
    pub fn x_row(&self, h: usize) -> &[u8] {
        &self.x[self.num_pumps * h..self.num_pumps * (h + 1)]
    }

    /// Off-to-on transition count per pump over the whole schedule. The
    /// switch-on out of the all-off base state is not an actuation.
    pub fn actuations(&self) -> Vec<usize> {
        let hours = self.y.len();
        let mut counts = vec![0usize; self.num_pumps];
        for h in 2..hours {
            let prev = &self.x[self.num_pumps * (h - 1)..self.num_pumps * h];
            let cur = &self.x[self.num_pumps * h..self.num_pumps * (h + 1)];
            for p in 0..self.num_pumps {
                if cur[p] > prev[p] {
                    counts[p] += 1;
                }
            }
        }
        counts
    }
}

// ============================================================================
// Oracle Interface
// ============================================================================

/// Node quantity readable from the oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeQuantity {
    /// Gauge pressure at a junction
    Pressure,
    /// Hydraulic head (used for tank levels)
    Head,
}

/// One hydraulic simulation the search core drives.
///
/// An implementation owns a loaded network. The evaluator constructs a
/// fresh oracle for every candidate evaluation and never rewinds one:
/// partial rewinds are not part of this contract. Implementations must be
/// deterministic for a given installed speed pattern.
///
/// Methods take `&mut self` throughout: a simulation handle is stateful,
/// and engine bindings mutate through reads as well.
pub trait HydraulicOracle: Sized {
    /// Load a network from its descriptor file.
    fn open(path: &Path) -> Result<Self, OracleError>;

    /// Initialize the hydraulic solver (flows re-initialized).
    fn init(&mut self) -> Result<(), OracleError>;

    /// Resolve a node name to its index.
    fn node_index(&mut self, name: &str) -> Result<NodeIndex, OracleError>;

    /// Resolve a pump name to its link index.
    fn pump_index(&mut self, name: &str) -> Result<PumpIndex, OracleError>;

    /// Set the speed factor of `pump` for pattern period `period` (0-based).
    /// Every period `0..h` must be set before stepping past hour `h`.
    fn set_pump_speed(
        &mut self,
        pump: PumpIndex,
        period: usize,
        factor: f64,
    ) -> Result<(), OracleError>;

    /// Compute the equilibrium at the current simulated time; returns that time.
    fn run_step(&mut self) -> Result<SimTime, OracleError>;

    /// Advance to the next event; returns the step length, 0 at end of horizon.
    fn advance_step(&mut self) -> Result<SimTime, OracleError>;

    /// Read a computed quantity at a node.
    fn node_value(&mut self, node: NodeIndex, quantity: NodeQuantity) -> Result<f64, OracleError>;

    /// Cumulative energy cost of one pump since `init`.
    fn pump_cost(&mut self, pump: PumpIndex) -> Result<f64, OracleError>;

    /// Dump the current network state to a file.
    fn save(&mut self, path: &Path) -> Result<(), OracleError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Failure inside the hydraulic oracle. Always fatal to the run.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("failed to read network file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse network file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("no such element in network: {name}")]
    NotFound { name: String },

    #[error("hydraulic engine failed during {op}: {detail}")]
    Engine { op: &'static str, detail: String },
}

impl OracleError {
    pub fn engine(op: &'static str, detail: impl Into<String>) -> Self {
        OracleError::Engine { op, detail: detail.into() }
    }
}

/// Failure of a whole solve run.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("hydraulic oracle failure: {0}")]
    Oracle(#[from] OracleError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
