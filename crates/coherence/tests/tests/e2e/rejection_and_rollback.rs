//! End-to-end: duplicates, store failures and collaborator failures never
//! leave the in-memory graph out of step with what callers were told.

use crate::support::{collaborators, orchestrator, test_config, FailingStore, Recorder};
use coherence_graph::{AgentId, InMemoryGraphStore, Metadata};
use coherence_runtime::{AgentState, CoherenceError, CoherenceOrchestrator};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn duplicate_edge_is_rejected_without_mutation() {
    let recorder = Arc::new(Recorder::default());
    let store = Arc::new(InMemoryGraphStore::new());
    let orch = orchestrator(store.clone(), &recorder);
    let agent = AgentId::new("dup");

    let first = orch
        .add_action_edge(&agent, "press button", "door opens", 0.8, Metadata::new())
        .await
        .unwrap();
    assert!(first.added);
    let before = orch.graph_snapshot(&agent).await.unwrap();

    let second = orch
        .add_action_edge(&agent, "press button", "door opens", 0.8, Metadata::new())
        .await
        .unwrap();
    assert!(!second.added);
    assert_eq!(second.score, 0.0);

    let after = orch.graph_snapshot(&agent).await.unwrap();
    assert_eq!(after.version(), before.version());
    assert_eq!(after, before);
    assert_eq!(store.save_count(), 1);

    orch.flush_notifications().await;
    // Only the accepted edge reaches metrics.
    assert_eq!(recorder.metric_scores(&agent).len(), 1);
    orch.shutdown().await;
}

#[tokio::test]
async fn store_failure_surfaces_and_rolls_back() {
    let recorder = Arc::new(Recorder::default());
    let store = Arc::new(FailingStore::default());
    let orch = orchestrator(store.clone(), &recorder);
    let agent = AgentId::new("flaky-store");

    orch.add_belief_edge(&agent, "sun rises east", "sun sets west", 1.0, Metadata::new())
        .await
        .unwrap();
    let before = orch.graph_snapshot(&agent).await.unwrap();

    store.fail_saves.store(true, Ordering::SeqCst);
    let err = orch
        .add_belief_edge(&agent, "X is true", "X is not true", 1.0, Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoherenceError::Store(_)));

    // Neither the new nodes nor the edge are visible.
    let after = orch.graph_snapshot(&agent).await.unwrap();
    assert_eq!(after, before);
    assert_eq!(orch.agent_state(&agent).await, AgentState::Persisted);

    // Nothing was announced for the rejected edge.
    orch.flush_notifications().await;
    assert_eq!(recorder.alert_count(), 0);
    assert_eq!(recorder.metric_scores(&agent).len(), 1);

    // Once the store recovers the same edge goes through.
    store.fail_saves.store(false, Ordering::SeqCst);
    let retry = orch
        .add_belief_edge(&agent, "X is true", "X is not true", 1.0, Metadata::new())
        .await
        .unwrap();
    assert!(retry.added);
    orch.shutdown().await;
}

#[tokio::test]
async fn failing_alert_sink_never_affects_the_caller() {
    let recorder = Arc::new(Recorder::default());
    recorder.fail_alerts.store(true, Ordering::SeqCst);
    let orch = orchestrator(Arc::new(InMemoryGraphStore::new()), &recorder);
    let agent = AgentId::new("silent-pager");

    let addition = orch
        .add_belief_edge(&agent, "X is true", "X is not true", 1.0, Metadata::new())
        .await
        .unwrap();
    assert!(addition.added);
    assert!(addition.score > 0.15);

    orch.flush_notifications().await;
    let dead = orch.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].notification.kind(), "threshold");
    assert_eq!(dead[0].attempts, 3);
    // Reflection and metrics are delivered independently.
    assert_eq!(recorder.reflection_count(), 1);
    assert_eq!(recorder.metric_scores(&agent).len(), 1);
    orch.shutdown().await;
}

#[tokio::test]
async fn edge_saved_before_timeout_is_announced_on_retry() {
    let recorder = Arc::new(Recorder::default());
    let store = Arc::new(FailingStore::default());
    let mut config = test_config();
    config.request_timeout_ms = 50;
    let orch =
        CoherenceOrchestrator::with_collaborators(config, store.clone(), collaborators(&recorder))
            .unwrap();
    let agent = AgentId::new("hung-store");

    store.hang_after_save.store(true, Ordering::SeqCst);
    let err = orch
        .add_belief_edge(&agent, "X is true", "X is not true", 1.0, Metadata::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CoherenceError::Timeout(_)));
    assert_eq!(store.inner.save_count(), 1);

    store.hang_after_save.store(false, Ordering::SeqCst);
    let retry = orch
        .add_belief_edge(&agent, "X is true", "X is not true", 1.0, Metadata::new())
        .await
        .unwrap();
    // The edge is already stored; the caller sees a duplicate.
    assert!(!retry.added);

    orch.flush_notifications().await;
    assert_eq!(recorder.alert_count(), 1);
    assert_eq!(recorder.reflection_count(), 1);
    let scores = recorder.metric_scores(&agent);
    assert_eq!(scores.len(), 1);
    assert!(scores[0] > 0.15);
    assert_eq!(orch.graph_snapshot(&agent).await.unwrap().edge_count(), 1);
    orch.shutdown().await;
}
