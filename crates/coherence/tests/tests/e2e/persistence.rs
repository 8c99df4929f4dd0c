//! End-to-end: graphs survive a restart through the file store.

use crate::support::{orchestrator, Recorder};
use coherence_graph::{AgentId, GraphStore, JsonFileGraphStore, Metadata};
use coherence_runtime::AgentState;
use std::sync::Arc;

#[tokio::test]
async fn graph_reloads_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let agent = AgentId::new("persistent");
    let recorder = Arc::new(Recorder::default());

    let saved = {
        let store = Arc::new(JsonFileGraphStore::open(dir.path()).await.unwrap());
        let orch = orchestrator(store, &recorder);
        orch.add_belief_edge(&agent, "X is true", "X is true", 1.0, Metadata::new())
            .await
            .unwrap();
        orch.add_belief_edge(&agent, "X is true", "X is not true", 1.0, Metadata::new())
            .await
            .unwrap();
        let graph = orch.graph_snapshot(&agent).await.unwrap();
        orch.shutdown().await;
        graph
    };

    let store = Arc::new(JsonFileGraphStore::open(dir.path()).await.unwrap());
    let orch = orchestrator(store.clone(), &recorder);
    assert_eq!(orch.agent_state(&agent).await, AgentState::Unloaded);

    let reloaded = orch.graph_snapshot(&agent).await.unwrap();
    assert_eq!(reloaded, saved);
    assert_eq!(orch.agent_state(&agent).await, AgentState::Loaded);

    // Dedup still applies against the reloaded graph.
    let again = orch
        .add_belief_edge(&agent, "X is true", "X is not true", 1.0, Metadata::new())
        .await
        .unwrap();
    assert!(!again.added);

    // Read-only story-loss of the reloaded graph: one of two edges contradicts.
    let loss = orch.story_loss(&agent).await.unwrap();
    assert_eq!(loss.total_edges, 2);
    assert_eq!(loss.contradictory_count, 1);
    assert!((loss.score - 0.4).abs() < 1e-12);

    orch.shutdown().await;
}

#[tokio::test]
async fn persisted_document_uses_camel_case_shape() {
    let dir = tempfile::tempdir().unwrap();
    let agent = AgentId::new("shape");
    let recorder = Arc::new(Recorder::default());
    let store = Arc::new(JsonFileGraphStore::open(dir.path()).await.unwrap());
    let orch = orchestrator(store.clone(), &recorder);

    orch.add_belief_edge(&agent, "X is true", "X is not true", 0.7, Metadata::new())
        .await
        .unwrap();
    orch.shutdown().await;

    let raw = std::fs::read_to_string(store.path_for(&agent)).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["agentId"], "shape");
    assert!(doc["version"].as_u64().unwrap() > 1);
    assert!(doc["lastUpdated"].is_string());
    assert_eq!(doc["nodes"].as_array().unwrap().len(), 2);
    let edge = &doc["edges"][0];
    assert_eq!(edge["type"], "belief");
    assert!(edge["sourceId"].is_string());
    assert!(edge["targetId"].is_string());
    assert_eq!(edge["confidence"], 0.7);
    assert!(doc["lastStoryLoss"].as_f64().unwrap() > 0.15);

    // Loading through the store trait round-trips the document.
    let loaded = store.load(&agent).await.unwrap().unwrap();
    assert_eq!(loaded.edge_count(), 1);
}
