//! Error types shared by the store, the projection engine and the runner

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Error, Debug)]
pub enum PlannerError {
    /// Referenced simulation, version or allocation does not exist
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u32 },

    /// Input rejected before any computation happens
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation would break a store rule (duplicate name, protected simulation)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PlannerError {
    pub fn not_found(entity: &'static str, id: u32) -> Self {
        PlannerError::NotFound { entity, id }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        PlannerError::InvalidInput(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PlannerError::NotFound { .. })
    }
}
