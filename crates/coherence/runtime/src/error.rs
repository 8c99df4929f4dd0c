use coherence_graph::{EdgeId, GraphError, StorageError, ValidationError};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to callers of the orchestrator.
#[derive(Error, Debug)]
pub enum CoherenceError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("duplicate edge: {0}")]
    Duplicate(EdgeId),

    #[error("graph store error: {0}")]
    Store(#[from] StorageError),

    #[error("graph error: {0}")]
    Graph(GraphError),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("orchestrator is shutting down")]
    ShuttingDown,

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<GraphError> for CoherenceError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::Validation(v) => CoherenceError::Validation(v),
            GraphError::DuplicateEdge(id) => CoherenceError::Duplicate(id),
            other => CoherenceError::Graph(other),
        }
    }
}

impl CoherenceError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, CoherenceError::Duplicate(_))
    }
}

pub type CoherenceResult<T> = Result<T, CoherenceError>;

/// Failure reported by an alerting, reflection or metrics collaborator.
/// Logged and retried by the dispatcher, never returned from `add_edge`.
#[derive(Error, Debug, Clone)]
#[error("{collaborator} failed: {message}")]
pub struct CollaboratorError {
    pub collaborator: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}

/// Errors from submitting background work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("task queue is full")]
    QueueFull,

    #[error("timed out after {0:?} waiting for queue space")]
    Timeout(Duration),

    #[error("processor is closed")]
    Closed,
}
