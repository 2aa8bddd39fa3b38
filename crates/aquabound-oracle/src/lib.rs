//! # aquabound-oracle
//!
//! Hydraulic oracle implementations for the aquabound optimizer.
//!
//! This crate provides:
//! - [`AnalyticNetwork`]: a deterministic closed-form three-tank network
//!   model, so the whole search stack runs under `cargo test` without a
//!   hydraulic engine
//! - [`ScriptedOracle`]: a replay oracle for exercising evaluator and
//!   constraint classification in isolation
//! - `EpanetOracle` (feature `epanet`): an adapter over the EPANET 2.3
//!   bindings for real network descriptor files

mod analytic;
mod scripted;

#[cfg(feature = "epanet")]
mod epanet;

pub use analytic::{AnalyticNetwork, AnalyticParams};
pub use scripted::{ScriptedOracle, ScriptedStep};

#[cfg(feature = "epanet")]
pub use crate::epanet::EpanetOracle;
