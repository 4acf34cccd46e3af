//! Patrimony Planner - Year-by-year net worth projections for versioned financial plans
//!
//! This library provides:
//! - Simulation records (movements, allocations, insurance policies) and a versioned in-memory store
//! - Snapshot assembly with the most recent valuation per allocation as of a version's start date
//! - A deterministic projection engine (growth, income, expenses, insurance, deceased adjustment)
//! - A runner producing with/without insurance series, single or batched

pub mod errors;
pub mod simulation;
pub mod projection;
pub mod runner;

// Re-export commonly used types
pub use errors::{PlannerError, Result};
pub use simulation::{SimulationStore, SnapshotSource};
pub use projection::{ProjectionEngine, ProjectionConfig, ProjectionResult, LifeStatus, YearlyPoint, FullProjectionResult};
pub use runner::{ProjectionRunner, ProjectionRequest};
