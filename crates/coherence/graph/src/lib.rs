#![deny(unsafe_code)]
//! # coherence-graph
//!
//! The narrative graph an agent reasons over: beliefs, actions, facts, goals
//! and events as nodes, typed relations between them as edges.
//!
//! ## Identity
//!
//! Every element is content-addressed via BLAKE3:
//!
//! ```text
//! node_id = blake3(type || content || timestamp)
//! edge_id = blake3(source_id || target_id || type)
//! ```
//!
//! Within one [`AgentGraph`] no two nodes share `(type, content)` and no two
//! edges share `(source, target, type)`.
//!
//! ## Key Types
//!
//! - [`Node`] / [`Edge`]: graph primitives
//! - [`AgentGraph`]: one agent's graph, the unit of persistence
//! - [`GraphStore`]: whole-document load/save backend trait
//! - [`InMemoryGraphStore`] / [`JsonFileGraphStore`]: bundled backends

pub mod edge;
pub mod error;
pub mod file_store;
pub mod graph;
pub mod node;
pub mod storage;
pub mod types;

pub use edge::Edge;
pub use error::{GraphError, StorageError, ValidationError};
pub use file_store::JsonFileGraphStore;
pub use graph::{AgentGraph, GraphSummary};
pub use node::Node;
pub use storage::{GraphStore, InMemoryGraphStore};
pub use types::{AgentId, EdgeId, EdgeType, ElementId, ElementIdError, Metadata, NodeId, NodeType};
