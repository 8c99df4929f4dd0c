use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::edge::Edge;
use crate::error::{GraphError, ValidationError};
use crate::node::Node;
use crate::types::{AgentId, EdgeId, EdgeType, Metadata, NodeId, NodeType};

/// One agent's narrative graph. This is the unit of persistence: stores
/// read and write it as a whole document.
///
/// Structural invariants, enforced by the mutators:
/// - no two nodes share an id or a `(type, content)` pair
/// - every edge references nodes present in the graph
/// - no two edges share an id or a `(source, target, type)` triple
/// - `version` strictly increases on every successful node or edge add
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct AgentGraph {
    agent_id: AgentId,
    version: u64,
    last_updated: DateTime<Utc>,
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
    last_story_loss: Option<f64>,
    by_content: HashMap<(NodeType, String), NodeId>,
    edge_index: HashMap<EdgeId, usize>,
    relation_index: HashMap<(NodeId, NodeId, EdgeType), usize>,
    adjacency: HashMap<NodeId, Vec<usize>>,
}

/// Persisted shape of an [`AgentGraph`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDocument {
    agent_id: AgentId,
    version: u64,
    last_updated: DateTime<Utc>,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_story_loss: Option<f64>,
}

impl From<AgentGraph> for GraphDocument {
    fn from(graph: AgentGraph) -> Self {
        Self {
            agent_id: graph.agent_id,
            version: graph.version,
            last_updated: graph.last_updated,
            nodes: graph.nodes.into_values().collect(),
            edges: graph.edges,
            last_story_loss: graph.last_story_loss,
        }
    }
}

impl TryFrom<GraphDocument> for AgentGraph {
    type Error = GraphError;

    fn try_from(doc: GraphDocument) -> Result<Self, Self::Error> {
        let mut graph = AgentGraph::new(doc.agent_id);
        for node in doc.nodes {
            graph.insert_node(node)?;
        }
        for edge in doc.edges {
            graph.insert_edge(edge)?;
        }
        // Restore persisted bookkeeping over what the inserts produced.
        graph.version = doc.version;
        graph.last_updated = doc.last_updated;
        graph.last_story_loss = doc.last_story_loss;
        Ok(graph)
    }
}

impl PartialEq for AgentGraph {
    fn eq(&self, other: &Self) -> bool {
        self.agent_id == other.agent_id
            && self.version == other.version
            && self.last_updated == other.last_updated
            && self.nodes == other.nodes
            && self.edges == other.edges
            && self.last_story_loss == other.last_story_loss
    }
}

/// Counts describing a graph, for logging and inspection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSummary {
    pub agent_id: AgentId,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_type: BTreeMap<NodeType, usize>,
    pub edges_by_type: BTreeMap<EdgeType, usize>,
}

impl AgentGraph {
    /// An empty graph at version 1.
    pub fn new(agent_id: AgentId) -> Self {
        Self {
            agent_id,
            version: 1,
            last_updated: Utc::now(),
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            last_story_loss: None,
            by_content: HashMap::new(),
            edge_index: HashMap::new(),
            relation_index: HashMap::new(),
            adjacency: HashMap::new(),
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Score recorded by the most recent accepted mutation, if any.
    pub fn last_story_loss(&self) -> Option<f64> {
        self.last_story_loss
    }

    /// Record a score. Not a structural mutation: the version is unchanged.
    pub fn set_last_story_loss(&mut self, score: f64) {
        self.last_story_loss = Some(score);
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up a node by its `(type, content)` identity.
    pub fn find_node(&self, node_type: NodeType, content: &str) -> Option<&Node> {
        self.by_content
            .get(&(node_type, content.to_string()))
            .and_then(|id| self.nodes.get(id))
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edge_index.get(id).map(|&i| &self.edges[i])
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_edge(&self, id: &EdgeId) -> bool {
        self.edge_index.contains_key(id)
    }

    /// Whether `edge` would be rejected as a duplicate, by id or by relation.
    pub fn is_duplicate(&self, edge: &Edge) -> bool {
        self.edge_index.contains_key(&edge.id)
            || self.relation_index.contains_key(&(
                edge.source_id.clone(),
                edge.target_id.clone(),
                edge.edge_type,
            ))
    }

    /// Source and target nodes of an edge, when both are present.
    pub fn endpoints(&self, edge: &Edge) -> Option<(&Node, &Node)> {
        Some((self.nodes.get(&edge.source_id)?, self.nodes.get(&edge.target_id)?))
    }

    /// Add a node. Fails on id collision or when a node with the same
    /// `(type, content)` already exists.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        let id = self.insert_node(node)?;
        self.touch();
        Ok(id)
    }

    /// Reuse the node with this `(type, content)` or create it.
    /// Returns the node id and whether it was created.
    pub fn ensure_node(
        &mut self,
        node_type: NodeType,
        content: &str,
        confidence: f64,
        metadata: Metadata,
    ) -> Result<(NodeId, bool), GraphError> {
        if let Some(existing) = self.find_node(node_type, content) {
            return Ok((existing.id.clone(), false));
        }
        let node = Node::new(node_type, content, confidence)?.with_metadata(metadata);
        let id = self.add_node(node)?;
        Ok((id, true))
    }

    /// Add an edge. Both endpoints must already be present and the edge must
    /// not duplicate an existing one.
    pub fn add_edge(&mut self, edge: Edge) -> Result<EdgeId, GraphError> {
        let id = self.insert_edge(edge)?;
        self.touch();
        Ok(id)
    }

    /// All edges touching a node, in insertion order.
    pub fn edges_of(&self, node_id: &NodeId) -> Vec<&Edge> {
        self.adjacency
            .get(node_id)
            .map(|indices| indices.iter().map(|&i| &self.edges[i]).collect())
            .unwrap_or_default()
    }

    pub fn outgoing_edges(&self, node_id: &NodeId) -> Vec<&Edge> {
        self.edges_of(node_id)
            .into_iter()
            .filter(|e| &e.source_id == node_id)
            .collect()
    }

    pub fn incoming_edges(&self, node_id: &NodeId) -> Vec<&Edge> {
        self.edges_of(node_id)
            .into_iter()
            .filter(|e| &e.target_id == node_id)
            .collect()
    }

    pub fn summary(&self) -> GraphSummary {
        let mut nodes_by_type = BTreeMap::new();
        for node in self.nodes.values() {
            *nodes_by_type.entry(node.node_type).or_insert(0) += 1;
        }
        let mut edges_by_type = BTreeMap::new();
        for edge in &self.edges {
            *edges_by_type.entry(edge.edge_type).or_insert(0) += 1;
        }
        GraphSummary {
            agent_id: self.agent_id.clone(),
            version: self.version,
            last_updated: self.last_updated,
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            nodes_by_type,
            edges_by_type,
        }
    }

    fn insert_node(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let key = (node.node_type, node.content.clone());
        if let Some(existing) = self.by_content.get(&key) {
            return Err(GraphError::DuplicateContent {
                node_type: node.node_type,
                existing: existing.clone(),
            });
        }
        let id = node.id.clone();
        self.by_content.insert(key, id.clone());
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    fn insert_edge(&mut self, edge: Edge) -> Result<EdgeId, GraphError> {
        for endpoint in [&edge.source_id, &edge.target_id] {
            if !self.nodes.contains_key(endpoint) {
                return Err(ValidationError::MissingEndpoint {
                    edge: edge.id.clone(),
                    node: endpoint.clone(),
                }
                .into());
            }
        }
        if self.is_duplicate(&edge) {
            return Err(GraphError::DuplicateEdge(edge.id));
        }

        let index = self.edges.len();
        let id = edge.id.clone();
        self.edge_index.insert(id.clone(), index);
        self.relation_index.insert(
            (edge.source_id.clone(), edge.target_id.clone(), edge.edge_type),
            index,
        );
        self.adjacency
            .entry(edge.source_id.clone())
            .or_default()
            .push(index);
        if edge.target_id != edge.source_id {
            self.adjacency
                .entry(edge.target_id.clone())
                .or_default()
                .push(index);
        }
        self.edges.push(edge);
        Ok(id)
    }

    fn touch(&mut self) {
        self.version += 1;
        self.last_updated = Utc::now();
    }
}
