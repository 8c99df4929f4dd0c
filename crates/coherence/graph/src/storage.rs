use crate::error::StorageError;
use crate::graph::AgentGraph;
use crate::types::AgentId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Durable per-agent graph persistence.
///
/// The whole graph is the unit of persistence: `save` overwrites the entire
/// document, so write cost grows with graph size rather than with the delta.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Load an agent's graph. A graph that was never saved is `Ok(None)`,
    /// not an error.
    async fn load(&self, agent_id: &AgentId) -> Result<Option<AgentGraph>, StorageError>;

    /// Overwrite the agent's persisted graph. Idempotent under retry.
    async fn save(&self, agent_id: &AgentId, graph: &AgentGraph) -> Result<(), StorageError>;
}

/// In-memory store for testing and development.
///
/// Graphs are held as serialized JSON documents so that every save and load
/// goes through the same encoding a document database would see.
#[derive(Clone, Default)]
pub struct InMemoryGraphStore {
    documents: Arc<RwLock<HashMap<AgentId, String>>>,
    saves: Arc<AtomicU64>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves since creation.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// Raw persisted document for an agent.
    pub fn document(&self, agent_id: &AgentId) -> Option<String> {
        self.documents
            .read()
            .ok()
            .and_then(|docs| docs.get(agent_id).cloned())
    }

    pub fn agent_count(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn load(&self, agent_id: &AgentId) -> Result<Option<AgentGraph>, StorageError> {
        let docs = self
            .documents
            .read()
            .map_err(|e| StorageError::Io(format!("lock poisoned: {}", e)))?;
        match docs.get(agent_id) {
            Some(doc) => Ok(Some(serde_json::from_str(doc)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, agent_id: &AgentId, graph: &AgentGraph) -> Result<(), StorageError> {
        let doc = serde_json::to_string(graph)?;
        let mut docs = self
            .documents
            .write()
            .map_err(|e| StorageError::Io(format!("lock poisoned: {}", e)))?;
        docs.insert(agent_id.clone(), doc);
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
