//! Projection engine turning a simulation version into a yearly net worth series

mod snapshot;
mod state;
mod engine;
mod cashflows;

pub use snapshot::{SimulationVersionSnapshot, InitialAllocation, latest_records_as_of};
pub use state::PatrimonyState;
pub use engine::{ProjectionEngine, ProjectionConfig, LifeStatus, DEFAULT_HORIZON_END_YEAR};
pub use cashflows::{YearlyPoint, YearCashflow, ProjectionResult, ProjectionSummary, FullProjectionResult};
