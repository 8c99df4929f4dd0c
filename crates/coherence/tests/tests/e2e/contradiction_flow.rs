//! End-to-end: a belief that contradicts history raises story-loss above the
//! threshold and fans out to alerting and self-reflection exactly once.

use crate::support::{orchestrator, Recorder};
use coherence_graph::{AgentId, EdgeType, InMemoryGraphStore, Metadata, NodeType};
use coherence_runtime::AgentState;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn negated_belief_triggers_alert_and_reflection_once() {
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator(Arc::new(InMemoryGraphStore::new()), &recorder);
    let agent = AgentId::new("narrator");

    let first = orch
        .add_belief_edge(&agent, "X is true", "X is true", 1.0, Metadata::new())
        .await
        .unwrap();
    assert!(first.added);
    assert_eq!(first.score, 0.0);

    let second = orch
        .add_belief_edge(&agent, "X is true", "X is not true", 1.0, Metadata::new())
        .await
        .unwrap();
    assert!(second.added);
    let result = second.result.unwrap();
    assert_eq!(result.contradictory_count, 1);
    assert_eq!(result.total_edges, 1);
    // 1/1 contradictory at the negation severity
    assert!((second.score - 0.8).abs() < 1e-12);

    orch.flush_notifications().await;

    assert_eq!(recorder.alert_count(), 1);
    assert_eq!(recorder.reflection_count(), 1);
    let alert = recorder.alerts.lock().unwrap()[0].clone();
    assert_eq!(alert.event_type, "story_loss_threshold");
    assert_eq!(alert.agent_id, agent);
    assert!((alert.score - 0.8).abs() < 1e-12);
    assert_eq!(alert.threshold, 0.15);

    let (_, _, context) = recorder.reflections.lock().unwrap()[0].clone();
    assert_eq!(context["target"], json!("X is not true"));
    assert_eq!(context["edgeType"], json!("belief"));
    assert_eq!(context["findings"].as_array().unwrap().len(), 1);

    // Metrics see every addition regardless of threshold.
    assert_eq!(recorder.metric_scores(&agent), vec![0.0, second.score]);

    let graph = orch.graph_snapshot(&agent).await.unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.last_story_loss(), Some(second.score));
    assert_eq!(orch.agent_state(&agent).await, AgentState::Persisted);

    orch.shutdown().await;
}

#[tokio::test]
async fn consistent_history_stays_below_threshold() {
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator(Arc::new(InMemoryGraphStore::new()), &recorder);
    let agent = AgentId::new("steady");

    for (source, target) in [
        ("rain is falling", "streets are wet"),
        ("streets are wet", "cars slow down"),
        ("red car", "blue car"),
    ] {
        let addition = orch
            .add_belief_edge(&agent, source, target, 0.9, Metadata::new())
            .await
            .unwrap();
        assert!(addition.added);
        assert_eq!(addition.score, 0.0);
    }

    orch.flush_notifications().await;
    assert_eq!(recorder.alert_count(), 0);
    assert_eq!(recorder.reflection_count(), 0);
    assert_eq!(recorder.metric_scores(&agent).len(), 3);
    orch.shutdown().await;
}

#[tokio::test]
async fn causal_edge_backwards_in_time_scores_full_loss() {
    let recorder = Arc::new(Recorder::default());
    let store = Arc::new(InMemoryGraphStore::new());
    let orch = orchestrator(store, &recorder);
    let agent = AgentId::new("timeline");

    orch.add_edge(&agent, EdgeType::Causal, "storm", "wind", 1.0, Metadata::new())
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    // "flood" is created strictly after "storm".
    orch.add_edge(&agent, EdgeType::Causal, "storm", "flood", 1.0, Metadata::new())
        .await
        .unwrap();
    let backwards = orch
        .add_edge(&agent, EdgeType::Causal, "flood", "storm", 1.0, Metadata::new())
        .await
        .unwrap();
    assert_eq!(backwards.score, 1.0);

    let graph = orch.graph_snapshot(&agent).await.unwrap();
    assert!(graph.find_node(NodeType::Event, "storm").is_some());
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 3);

    orch.flush_notifications().await;
    assert_eq!(recorder.alert_count(), 1);
    orch.shutdown().await;
}

#[tokio::test]
async fn read_only_story_loss_is_cached_until_next_mutation() {
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator(Arc::new(InMemoryGraphStore::new()), &recorder);
    let agent = AgentId::new("reader");

    orch.add_belief_edge(&agent, "X is true", "X is not true", 1.0, Metadata::new())
        .await
        .unwrap();

    let runs = orch.calculator().detection_runs();
    let a = orch.story_loss(&agent).await.unwrap();
    let b = orch.story_loss(&agent).await.unwrap();
    assert_eq!(a.score.to_bits(), b.score.to_bits());
    assert_eq!(a.computed_at, b.computed_at);
    assert_eq!(orch.calculator().detection_runs(), runs + 1);

    orch.add_belief_edge(&agent, "sky is blue", "grass is green", 1.0, Metadata::new())
        .await
        .unwrap();
    let after_mutation = orch.calculator().detection_runs();
    let c = orch.story_loss(&agent).await.unwrap();
    assert_eq!(orch.calculator().detection_runs(), after_mutation + 1);
    assert_eq!(c.total_edges, 2);
    assert!((c.score - 0.4).abs() < 1e-12);

    orch.shutdown().await;
}
