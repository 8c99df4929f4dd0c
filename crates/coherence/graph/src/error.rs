use crate::types::{EdgeId, NodeId, NodeType};

/// Errors from graph mutation.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("node already exists: {0}")]
    DuplicateNode(NodeId),
    #[error("{node_type} node with identical content already exists: {existing}")]
    DuplicateContent { node_type: NodeType, existing: NodeId },
    #[error("edge already exists: {0}")]
    DuplicateEdge(EdgeId),
}

/// Errors from input validation. Raised before any mutation happens.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("edge {edge} references missing node {node}")]
    MissingEndpoint { edge: EdgeId, node: NodeId },
    #[error("malformed kind: {0:?}")]
    MalformedKind(String),
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("node content must not be empty")]
    EmptyContent,
}

/// Errors from graph store backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
