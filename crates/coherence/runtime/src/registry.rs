//! Per-agent graph ownership.

use coherence_graph::{AgentGraph, AgentId, EdgeId, GraphStore, StorageError};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::notifications::Notification;

/// Lifecycle of an agent's in-memory graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Not in memory yet.
    #[default]
    Unloaded,
    /// Loaded from the store, or freshly created; nothing written since.
    Loaded,
    /// A write is in progress or was interrupted; memory may disagree with
    /// the store, so the next access reloads.
    Dirty,
    /// Last mutation was saved.
    Persisted,
}

/// An edge whose save has started, with the notifications owed once the
/// save is known to have landed.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingWrite {
    pub edge_id: EdgeId,
    pub notifications: Vec<Notification>,
}

/// Single-writer handle for one agent's graph.
#[derive(Debug, Default)]
pub struct AgentSlot {
    state: AgentState,
    graph: Option<AgentGraph>,
    pending: Option<PendingWrite>,
    recovered: Option<PendingWrite>,
}

impl AgentSlot {
    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn graph(&self) -> Option<&AgentGraph> {
        self.graph.as_ref()
    }

    /// Make the graph resident, loading it or creating an empty one.
    pub async fn ensure_loaded(
        &mut self,
        agent_id: &AgentId,
        store: &dyn GraphStore,
    ) -> Result<&AgentGraph, StorageError> {
        if matches!(self.state, AgentState::Unloaded | AgentState::Dirty) || self.graph.is_none() {
            let graph = match store.load(agent_id).await? {
                Some(graph) => {
                    tracing::info!(
                        agent_id = %agent_id,
                        version = graph.version(),
                        nodes = graph.node_count(),
                        edges = graph.edge_count(),
                        "Graph loaded"
                    );
                    graph
                }
                None => {
                    tracing::info!(agent_id = %agent_id, "No stored graph, starting empty");
                    AgentGraph::new(agent_id.clone())
                }
            };
            if let Some(pending) = self.pending.take() {
                if graph.contains_edge(&pending.edge_id) {
                    tracing::info!(
                        agent_id = %agent_id,
                        edge_id = %pending.edge_id,
                        "Interrupted write found in store"
                    );
                    self.recovered = Some(pending);
                } else {
                    tracing::debug!(
                        agent_id = %agent_id,
                        edge_id = %pending.edge_id,
                        "Interrupted write not in store, discarding"
                    );
                }
            }
            self.graph = Some(graph);
            self.state = AgentState::Loaded;
        }
        self.graph
            .as_ref()
            .ok_or_else(|| StorageError::Unavailable(format!("graph for {} not resident", agent_id)))
    }

    /// Mark a write as started. Returns the state to restore if it fails.
    ///
    /// `pending` is held until the write resolves. If the caller is cancelled
    /// mid-save, the next reload checks the store for the edge and, when it
    /// landed, hands the write back through [`take_recovered`](Self::take_recovered).
    pub fn begin_write(&mut self, pending: PendingWrite) -> AgentState {
        self.pending = Some(pending);
        std::mem::replace(&mut self.state, AgentState::Dirty)
    }

    pub fn abort_write(&mut self, previous: AgentState) {
        self.pending = None;
        self.state = previous;
    }

    /// Install a graph that has been saved. Returns the notifications of the
    /// write it completes.
    pub fn commit(&mut self, graph: AgentGraph) -> Vec<Notification> {
        self.graph = Some(graph);
        self.state = AgentState::Persisted;
        self.pending
            .take()
            .map(|pending| pending.notifications)
            .unwrap_or_default()
    }

    /// A write interrupted after it reached the store, found by the last
    /// reload.
    pub fn take_recovered(&mut self) -> Option<PendingWrite> {
        self.recovered.take()
    }
}

/// Concurrency-safe map from agent to its slot.
///
/// Slots are guarded by a FIFO-fair async mutex: calls for one agent run one
/// at a time in arrival order, calls for different agents do not contend.
///
/// A slot stays resident until [`evict`](Self::evict) removes it; nothing
/// unloads idle agents on its own.
#[derive(Default)]
pub struct AgentRegistry {
    slots: DashMap<AgentId, Arc<Mutex<AgentSlot>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The agent's slot, created on first use.
    pub fn slot(&self, agent_id: &AgentId) -> Arc<Mutex<AgentSlot>> {
        if let Some(slot) = self.slots.get(agent_id) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.slots.entry(agent_id.clone()).or_default().value())
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<Arc<Mutex<AgentSlot>>> {
        self.slots.get(agent_id).map(|slot| Arc::clone(slot.value()))
    }

    pub async fn state(&self, agent_id: &AgentId) -> AgentState {
        match self.get(agent_id) {
            Some(slot) => slot.lock().await.state(),
            None => AgentState::Unloaded,
        }
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.slots.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Remove an idle agent's slot so its graph is reloaded from the store on
    /// next use. Refused while the slot is in use or a write is unresolved.
    pub fn evict(&self, agent_id: &AgentId) -> bool {
        let evicted = self
            .slots
            .remove_if(agent_id, |_, slot| {
                Arc::strong_count(slot) == 1
                    && slot
                        .try_lock()
                        .map(|guard| guard.state != AgentState::Dirty && guard.recovered.is_none())
                        .unwrap_or(false)
            })
            .is_some();
        if evicted {
            tracing::debug!(agent_id = %agent_id, "Agent slot evicted");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
