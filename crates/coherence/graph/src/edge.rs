use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{check_unit_interval, EdgeId, EdgeType, NodeId};

/// A typed relation between two nodes of the same agent graph.
///
/// The id is derived from `(source_id, target_id, type)`, so two submissions
/// of the same relation always collide.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
    pub weight: f64,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl Edge {
    pub fn compute_id(source_id: &NodeId, target_id: &NodeId, edge_type: EdgeType) -> EdgeId {
        EdgeId::hash_fields(&[
            b"edge",
            source_id.as_bytes(),
            target_id.as_bytes(),
            edge_type.as_str().as_bytes(),
        ])
    }

    /// Create an edge with a derived id, unit weight, stamped now.
    pub fn new(
        source_id: NodeId,
        target_id: NodeId,
        edge_type: EdgeType,
        confidence: f64,
    ) -> Result<Self, ValidationError> {
        let id = Self::compute_id(&source_id, &target_id, edge_type);
        Self::with_id(id, source_id, target_id, edge_type, 1.0, confidence, Utc::now())
    }

    /// Create an edge with every field supplied by the caller.
    pub fn with_id(
        id: EdgeId,
        source_id: NodeId,
        target_id: NodeId,
        edge_type: EdgeType,
        weight: f64,
        confidence: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        check_unit_interval("weight", weight)?;
        check_unit_interval("confidence", confidence)?;
        Ok(Self {
            id,
            source_id,
            target_id,
            edge_type,
            weight,
            confidence,
            timestamp,
        })
    }

    pub fn with_weight(mut self, weight: f64) -> Result<Self, ValidationError> {
        check_unit_interval("weight", weight)?;
        self.weight = weight;
        Ok(self)
    }

    pub fn touches(&self, node_id: &NodeId) -> bool {
        &self.source_id == node_id || &self.target_id == node_id
    }
}
