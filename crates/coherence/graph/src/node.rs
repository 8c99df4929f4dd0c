use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{check_unit_interval, Metadata, NodeId, NodeType};

/// A node in an agent's narrative graph.
///
/// The id is content-addressed over `(type, content, timestamp)` unless the
/// caller supplies one explicitly via [`Node::with_id`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// The semantic payload being reasoned over.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Node {
    /// Compute the content-addressed id for the identity-defining fields.
    pub fn compute_id(node_type: NodeType, content: &str, timestamp: &DateTime<Utc>) -> NodeId {
        let ts = timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true);
        NodeId::hash_fields(&[
            b"node",
            node_type.as_str().as_bytes(),
            content.as_bytes(),
            ts.as_bytes(),
        ])
    }

    /// Create a node stamped with the current time.
    pub fn new(
        node_type: NodeType,
        content: impl Into<String>,
        confidence: f64,
    ) -> Result<Self, ValidationError> {
        Self::at(node_type, content, Utc::now(), confidence)
    }

    /// Create a node with an explicit timestamp; the id is derived.
    pub fn at(
        node_type: NodeType,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        confidence: f64,
    ) -> Result<Self, ValidationError> {
        let content = content.into();
        let id = Self::compute_id(node_type, &content, &timestamp);
        Self::with_id(id, node_type, content, timestamp, confidence)
    }

    /// Create a node with a caller-supplied id.
    pub fn with_id(
        id: NodeId,
        node_type: NodeType,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        confidence: f64,
    ) -> Result<Self, ValidationError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        check_unit_interval("confidence", confidence)?;
        Ok(Self {
            id,
            node_type,
            content,
            timestamp,
            confidence,
            metadata: Metadata::new(),
        })
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether this node carries the given `(type, content)` identity.
    pub fn matches(&self, node_type: NodeType, content: &str) -> bool {
        self.node_type == node_type && self.content == content
    }
}
