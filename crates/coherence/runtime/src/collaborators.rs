//! Outbound collaborators: alerting, self-reflection and metrics.
//!
//! All three are best-effort. The orchestrator never calls them inline;
//! the notification dispatcher delivers to them with retry and dead-lettering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coherence_graph::{AgentId, Metadata};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::CollaboratorError;

pub const STORY_LOSS_THRESHOLD_EVENT: &str = "story_loss_threshold";

/// Raised when a mutation-path score exceeds the configured threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdEvent {
    pub event_type: String,
    pub agent_id: AgentId,
    pub score: f64,
    pub threshold: f64,
    pub graph_version: u64,
    pub timestamp: DateTime<Utc>,
}

impl ThresholdEvent {
    pub fn new(agent_id: AgentId, score: f64, threshold: f64, graph_version: u64) -> Self {
        Self {
            event_type: STORY_LOSS_THRESHOLD_EVENT.to_string(),
            agent_id,
            score,
            threshold,
            graph_version,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, event: &ThresholdEvent) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait ReflectionTrigger: Send + Sync {
    async fn trigger_reflection(
        &self,
        agent_id: &AgentId,
        score: f64,
        context: &Metadata,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait MetricsRecorder: Send + Sync {
    async fn record(
        &self,
        agent_id: &AgentId,
        score: f64,
        metadata: &Metadata,
    ) -> Result<(), CollaboratorError>;
}

/// Alert sink that emits a warning event.
#[derive(Debug, Default, Clone)]
pub struct LoggingAlertSink;

#[async_trait]
impl AlertSink for LoggingAlertSink {
    async fn notify(&self, event: &ThresholdEvent) -> Result<(), CollaboratorError> {
        tracing::warn!(
            event_type = %event.event_type,
            agent_id = %event.agent_id,
            score = event.score,
            threshold = event.threshold,
            version = event.graph_version,
            "Story-loss threshold exceeded"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct LoggingReflectionTrigger;

#[async_trait]
impl ReflectionTrigger for LoggingReflectionTrigger {
    async fn trigger_reflection(
        &self,
        agent_id: &AgentId,
        score: f64,
        context: &Metadata,
    ) -> Result<(), CollaboratorError> {
        tracing::info!(
            agent_id = %agent_id,
            score,
            context_keys = context.len(),
            "Self-reflection requested"
        );
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct LoggingMetricsRecorder;

#[async_trait]
impl MetricsRecorder for LoggingMetricsRecorder {
    async fn record(
        &self,
        agent_id: &AgentId,
        score: f64,
        metadata: &Metadata,
    ) -> Result<(), CollaboratorError> {
        tracing::debug!(
            agent_id = %agent_id,
            score,
            metadata_keys = metadata.len(),
            "Story-loss recorded"
        );
        Ok(())
    }
}

/// The set of collaborators the dispatcher delivers to.
#[derive(Clone)]
pub struct Collaborators {
    pub alerts: Arc<dyn AlertSink>,
    pub reflection: Arc<dyn ReflectionTrigger>,
    pub metrics: Arc<dyn MetricsRecorder>,
}

impl Collaborators {
    pub fn with_alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_reflection(mut self, reflection: Arc<dyn ReflectionTrigger>) -> Self {
        self.reflection = reflection;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            alerts: Arc::new(LoggingAlertSink),
            reflection: Arc::new(LoggingReflectionTrigger),
            metrics: Arc::new(LoggingMetricsRecorder),
        }
    }
}
