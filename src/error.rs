//! Error types for the store and the workflow engine.

use thiserror::Error;

/// Failures of the record store or the catalog cache.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Project {0} not found")]
    ProjectNotFound(u64),

    #[error("Task {0} not found")]
    TaskNotFound(u64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Failures surfaced by the catalog, the editor and the reconciler.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Formula name cannot be empty")]
    EmptyFormulaName,

    #[error("Formula '{0}' already exists")]
    DuplicateFormula(String),

    #[error("Unknown formula '{0}'")]
    UnknownFormula(String),

    #[error("Step {index} is out of range for formula '{formula}' ({len} steps)")]
    StepOutOfRange { formula: String, index: usize, len: usize },

    #[error("Evaluation must be between 0 and 20, got {0}")]
    InvalidEvaluation(u8),

    #[error("Failed to write local catalog cache: {0}")]
    LocalCache(#[source] StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
