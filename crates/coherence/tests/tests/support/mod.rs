#![allow(dead_code)]

use async_trait::async_trait;
use coherence_graph::{AgentGraph, AgentId, GraphStore, InMemoryGraphStore, Metadata, StorageError};
use coherence_runtime::{
    AlertSink, CoherenceConfig, CoherenceOrchestrator, CollaboratorError, Collaborators,
    MetricsRecorder, ReflectionTrigger, ThresholdEvent,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Collaborator that records every call it receives.
#[derive(Default)]
pub struct Recorder {
    pub alerts: Mutex<Vec<ThresholdEvent>>,
    pub reflections: Mutex<Vec<(AgentId, f64, Metadata)>>,
    pub metrics: Mutex<Vec<(AgentId, f64)>>,
    pub fail_alerts: AtomicBool,
}

impl Recorder {
    pub fn alert_count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }

    pub fn reflection_count(&self) -> usize {
        self.reflections.lock().unwrap().len()
    }

    pub fn metric_scores(&self, agent: &AgentId) -> Vec<f64> {
        self.metrics
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == agent)
            .map(|(_, s)| *s)
            .collect()
    }
}

#[async_trait]
impl AlertSink for Recorder {
    async fn notify(&self, event: &ThresholdEvent) -> Result<(), CollaboratorError> {
        if self.fail_alerts.load(Ordering::SeqCst) {
            return Err(CollaboratorError::new("alert_sink", "pager offline"));
        }
        self.alerts.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[async_trait]
impl ReflectionTrigger for Recorder {
    async fn trigger_reflection(
        &self,
        agent_id: &AgentId,
        score: f64,
        context: &Metadata,
    ) -> Result<(), CollaboratorError> {
        self.reflections
            .lock()
            .unwrap()
            .push((agent_id.clone(), score, context.clone()));
        Ok(())
    }
}

#[async_trait]
impl MetricsRecorder for Recorder {
    async fn record(
        &self,
        agent_id: &AgentId,
        score: f64,
        _metadata: &Metadata,
    ) -> Result<(), CollaboratorError> {
        self.metrics.lock().unwrap().push((agent_id.clone(), score));
        Ok(())
    }
}

pub fn collaborators(recorder: &Arc<Recorder>) -> Collaborators {
    Collaborators::default()
        .with_alerts(recorder.clone())
        .with_reflection(recorder.clone())
        .with_metrics(recorder.clone())
}

pub fn test_config() -> CoherenceConfig {
    let mut config = CoherenceConfig::default();
    config.processor.workers = 2;
    config.notifications.retry_backoff_ms = 1;
    config
}

pub fn orchestrator(
    store: Arc<dyn GraphStore>,
    recorder: &Arc<Recorder>,
) -> CoherenceOrchestrator {
    CoherenceOrchestrator::with_collaborators(test_config(), store, collaborators(recorder)).unwrap()
}

/// In-memory store whose saves can be switched to fail, or to hang after
/// the document has been written.
#[derive(Default)]
pub struct FailingStore {
    pub inner: InMemoryGraphStore,
    pub fail_saves: AtomicBool,
    pub hang_after_save: AtomicBool,
}

#[async_trait]
impl GraphStore for FailingStore {
    async fn load(&self, agent_id: &AgentId) -> Result<Option<AgentGraph>, StorageError> {
        self.inner.load(agent_id).await
    }

    async fn save(&self, agent_id: &AgentId, graph: &AgentGraph) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("store offline".into()));
        }
        self.inner.save(agent_id, graph).await?;
        if self.hang_after_save.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        }
        Ok(())
    }
}
