//! Simulation records, the in-memory store and its JSON loader

mod data;
mod store;
pub mod loader;

pub use data::{
    Simulation, SimulationVersion, Movement, MovementType, Frequency, Allocation, AllocationType,
    AllocationRecord, Insurance,
};
pub use store::{
    SimulationStore, SnapshotSource, VersionUpdate, NewMovement, NewInsurance, NewAllocation,
    NewAllocationRecord, MovementUpdate, InsuranceUpdate, AllocationUpdate, AllocationRecordUpdate,
    PROTECTED_SIMULATION_NAME,
};
pub use loader::{load_store, load_store_from_reader, load_default_store, save_store, DEFAULT_STORE_PATH};
