use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by workflow CRUD and dispatch operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(Uuid),

    #[error("Workflow validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Workflow \"{0}\" has no steps to execute")]
    NoSteps(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("trigger error: {0}")]
    TriggerError(String),

    #[error("execution queue closed")]
    QueueClosed,
}
