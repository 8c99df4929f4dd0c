//! End-to-end: one writer per agent, full parallelism across agents.

use crate::support::{orchestrator, Recorder};
use coherence_graph::{AgentId, InMemoryGraphStore, Metadata, NodeType};
use coherence_runtime::{CoherenceError, ShutdownMode};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_agents_do_not_interfere() {
    let recorder = Arc::new(Recorder::default());
    let orch = Arc::new(orchestrator(Arc::new(InMemoryGraphStore::new()), &recorder));

    let mut handles = Vec::new();
    for a in 0..8 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move {
            let agent = AgentId::new(format!("agent-{}", a));
            for i in 0..20 {
                let addition = orch
                    .add_belief_edge(
                        &agent,
                        &format!("fact {} holds", i),
                        &format!("fact {} follows", i),
                        1.0,
                        Metadata::new(),
                    )
                    .await
                    .unwrap();
                assert!(addition.added);
            }
            agent
        }));
    }

    for handle in handles {
        let agent = handle.await.unwrap();
        let graph = orch.graph_snapshot(&agent).await.unwrap();
        assert_eq!(graph.edge_count(), 20);
        assert_eq!(graph.node_count(), 40);
        // One bump per node and per edge on top of the initial version.
        assert_eq!(graph.version(), 1 + 40 + 20);
    }
    assert_eq!(orch.agents().len(), 8);
    orch.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_to_one_agent_are_serialized() {
    let recorder = Arc::new(Recorder::default());
    let orch = Arc::new(orchestrator(Arc::new(InMemoryGraphStore::new()), &recorder));
    let agent = AgentId::new("shared");

    let mut handles = Vec::new();
    for i in 0..32 {
        let orch = orch.clone();
        let agent = agent.clone();
        handles.push(tokio::spawn(async move {
            orch.add_belief_edge(
                &agent,
                "hub belief",
                &format!("spoke {}", i),
                1.0,
                Metadata::new(),
            )
            .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().added);
    }

    let graph = orch.graph_snapshot(&agent).await.unwrap();
    assert_eq!(graph.edge_count(), 32);
    // The shared source node was created exactly once.
    assert_eq!(graph.node_count(), 33);
    assert_eq!(graph.version(), 1 + 33 + 32);
    orch.shutdown().await;
}

#[tokio::test]
async fn edges_are_applied_in_submission_order() {
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator(Arc::new(InMemoryGraphStore::new()), &recorder);
    let agent = AgentId::new("ordered");

    let targets: Vec<String> = (0..10).map(|i| format!("step {}", i)).collect();
    for target in &targets {
        orch.add_action_edge(&agent, "walk forward", target, 1.0, Metadata::new())
            .await
            .unwrap();
    }

    let graph = orch.graph_snapshot(&agent).await.unwrap();
    let applied: Vec<String> = graph
        .edges()
        .iter()
        .map(|e| graph.node(&e.target_id).unwrap().content.clone())
        .collect();
    assert_eq!(applied, targets);

    for target in &targets {
        let node = graph.find_node(NodeType::Event, target).unwrap();
        assert_eq!(graph.incoming_edges(&node.id).len(), 1);
    }
    orch.shutdown().await;
}

#[tokio::test]
async fn shutdown_drains_and_then_rejects() {
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator(Arc::new(InMemoryGraphStore::new()), &recorder);
    assert_eq!(orch.config().processor.shutdown, ShutdownMode::Drain);
    let agent = AgentId::new("closing");

    for i in 0..5 {
        orch.add_belief_edge(&agent, "X is true", &format!("X is not true {}", i), 1.0, Metadata::new())
            .await
            .unwrap();
    }
    orch.shutdown().await;

    // Drain delivered everything queued before shutdown.
    assert_eq!(recorder.alert_count(), 5);
    assert_eq!(recorder.metric_scores(&agent).len(), 5);
    let stats = orch.processor_stats();
    assert_eq!(stats.dropped, 0);
    assert_eq!(stats.completed + stats.failed + stats.rejected, 5);

    let err = orch
        .add_belief_edge(&agent, "late", "arrival", 1.0, Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoherenceError::ShuttingDown));
}
