//! Search statistics.
//!
//! Per-hour counters for feasible nodes and for each prune reason, plus
//! wall time. Each worker keeps its own; the totals are merged
//! coordinate-wise at shutdown.

use aquabound_core::PruneReason;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Debug, Serialize)]
pub struct SearchStats {
    /// Prune counts per reason, indexed by hour `0..=h_max`
    prunings: BTreeMap<PruneReason, Vec<u64>>,
    /// Feasible evaluations per hour
    feasible: Vec<u64>,
    /// Wall-clock time spent searching, seconds
    pub duration_secs: f64,
}

impl SearchStats {
    pub fn new(h_max: usize) -> Self {
        let prunings = PruneReason::ALL
            .iter()
            .map(|&reason| (reason, vec![0; h_max + 1]))
            .collect();
        Self {
            prunings,
            feasible: vec![0; h_max + 1],
            duration_secs: 0.0,
        }
    }

    pub fn record_prune(&mut self, reason: PruneReason, h: usize) {
        if let Some(counts) = self.prunings.get_mut(&reason) {
            counts[h] += 1;
        }
    }

    pub fn record_feasible(&mut self, h: usize) {
        self.feasible[h] += 1;
    }

    pub fn feasible_at(&self, h: usize) -> u64 {
        self.feasible[h]
    }

    pub fn prunes_at(&self, reason: PruneReason, h: usize) -> u64 {
        self.prunings.get(&reason).map_or(0, |counts| counts[h])
    }

    pub fn total_prunes(&self, reason: PruneReason) -> u64 {
        self.prunings
            .get(&reason)
            .map_or(0, |counts| counts.iter().sum())
    }

    pub fn total_feasible(&self) -> u64 {
        self.feasible.iter().sum()
    }

    /// Coordinate-wise sum with another worker's counters. Wall time takes
    /// the maximum: workers run side by side.
    pub fn merge(&mut self, other: &SearchStats) {
        for (reason, counts) in &mut self.prunings {
            if let Some(theirs) = other.prunings.get(reason) {
                for (mine, theirs) in counts.iter_mut().zip(theirs) {
                    *mine += theirs;
                }
            }
        }
        for (mine, theirs) in self.feasible.iter_mut().zip(&other.feasible) {
            *mine += theirs;
        }
        self.duration_secs = self.duration_secs.max(other.duration_secs);
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!(self)
    }
}

/// Per-hour table, one row per hour, one column per prune reason.
impl fmt::Display for SearchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5}", "hour")?;
        for reason in PruneReason::ALL {
            write!(f, " {:>10}", reason.as_str())?;
        }
        writeln!(f, " {:>10}", "feasible")?;

        for h in 1..self.feasible.len() {
            write!(f, "{h:>5}")?;
            for reason in PruneReason::ALL {
                write!(f, " {:>10}", self.prunes_at(reason, h))?;
            }
            writeln!(f, " {:>10}", self.feasible[h])?;
        }

        writeln!(f, "search time: {:.3}s", self.duration_secs)
    }
}
