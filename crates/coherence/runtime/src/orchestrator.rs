//! The coherence orchestrator: the inbound API for edge additions.

use coherence_detector::{ContradictionDetector, StoryLossCalculator, StoryLossResult};
use coherence_graph::{AgentGraph, AgentId, Edge, EdgeType, GraphStore, Metadata, StorageError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::collaborators::{Collaborators, ThresholdEvent};
use crate::config::CoherenceConfig;
use crate::consolidation::ConsolidationTask;
use crate::error::{CoherenceError, CoherenceResult};
use crate::notifications::{DeadLetter, DispatcherStats, Notification, NotificationDispatcher};
use crate::processor::{AsyncGraphProcessor, ProcessorStats};
use crate::registry::{AgentRegistry, AgentSlot, AgentState, PendingWrite};

/// Outcome of an inbound edge addition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeAddition {
    /// Story-loss of the edge; 0 when it was not added.
    pub score: f64,
    pub added: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StoryLossResult>,
}

impl EdgeAddition {
    fn added(result: StoryLossResult) -> Self {
        Self {
            score: result.score,
            added: true,
            result: Some(result),
        }
    }

    fn duplicate() -> Self {
        Self {
            score: 0.0,
            added: false,
            result: None,
        }
    }
}

/// Owns every agent's graph and gates each new edge through story-loss
/// scoring before it is persisted.
///
/// Calls for one agent are serialized in arrival order; calls for different
/// agents run in parallel. Alerting, reflection and metrics are delivered
/// asynchronously and never affect the result of an addition.
pub struct CoherenceOrchestrator {
    config: CoherenceConfig,
    store: Arc<dyn GraphStore>,
    registry: AgentRegistry,
    detector: Arc<ContradictionDetector>,
    calculator: Arc<StoryLossCalculator>,
    processor: AsyncGraphProcessor,
    notifier: NotificationDispatcher,
    janitor: Mutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
}

impl CoherenceOrchestrator {
    /// Build with the logging collaborators. Must be called within a tokio
    /// runtime.
    pub fn new(config: CoherenceConfig, store: Arc<dyn GraphStore>) -> CoherenceResult<Self> {
        Self::with_collaborators(config, store, Collaborators::default())
    }

    pub fn with_collaborators(
        config: CoherenceConfig,
        store: Arc<dyn GraphStore>,
        collaborators: Collaborators,
    ) -> CoherenceResult<Self> {
        config.validate()?;

        let detector = Arc::new(ContradictionDetector::new(&config.detector));
        let calculator = Arc::new(StoryLossCalculator::new(
            Arc::clone(&detector),
            config.cache_ttl(),
        ));
        let janitor = (config.cache.clear_interval_secs > 0).then(|| {
            calculator.spawn_janitor(Duration::from_secs(config.cache.clear_interval_secs))
        });
        let processor = AsyncGraphProcessor::start(&config.processor);
        let notifier = NotificationDispatcher::spawn(collaborators, &config.notifications);

        tracing::info!(
            threshold = config.threshold,
            request_timeout_ms = config.request_timeout_ms,
            cache_ttl_secs = config.cache.ttl_secs,
            "Coherence orchestrator started"
        );

        Ok(Self {
            config,
            store,
            registry: AgentRegistry::new(),
            detector,
            calculator,
            processor,
            notifier,
            janitor: Mutex::new(janitor),
            shutting_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &CoherenceConfig {
        &self.config
    }

    pub fn calculator(&self) -> &Arc<StoryLossCalculator> {
        &self.calculator
    }

    /// Add a `kind` edge between the nodes holding `source` and `target`,
    /// creating them if needed, and return its story-loss.
    ///
    /// Fails with `Duplicate` if the edge already exists, `Validation` on bad
    /// input, `Store` if loading or saving fails and `Timeout` when the whole
    /// operation exceeds the configured request timeout. On any failure the
    /// in-memory graph is left as it was.
    pub async fn add_edge(
        &self,
        agent_id: &AgentId,
        kind: EdgeType,
        source: &str,
        target: &str,
        confidence: f64,
        metadata: Metadata,
    ) -> CoherenceResult<StoryLossResult> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(CoherenceError::ShuttingDown);
        }
        let timeout = self.config.request_timeout();
        match tokio::time::timeout(
            timeout,
            self.add_edge_locked(agent_id, kind, source, target, confidence, metadata),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    agent_id = %agent_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Edge addition timed out"
                );
                Err(CoherenceError::Timeout(timeout))
            }
        }
    }

    pub async fn add_belief_edge(
        &self,
        agent_id: &AgentId,
        source: &str,
        target: &str,
        confidence: f64,
        metadata: Metadata,
    ) -> CoherenceResult<EdgeAddition> {
        self.add_inbound(agent_id, EdgeType::Belief, source, target, confidence, metadata)
            .await
    }

    pub async fn add_action_edge(
        &self,
        agent_id: &AgentId,
        source: &str,
        target: &str,
        confidence: f64,
        metadata: Metadata,
    ) -> CoherenceResult<EdgeAddition> {
        self.add_inbound(agent_id, EdgeType::Action, source, target, confidence, metadata)
            .await
    }

    /// Read-only story-loss of the agent's whole graph, served from the cache
    /// while fresh.
    pub async fn story_loss(&self, agent_id: &AgentId) -> CoherenceResult<StoryLossResult> {
        let slot = self.registry.slot(agent_id);
        let mut slot = slot.lock().await;
        let graph = self.resident(agent_id, &mut slot).await?;
        Ok(self.calculator.cached_score(agent_id, graph))
    }

    /// Copy of the agent's current graph, loading it if needed.
    pub async fn graph_snapshot(&self, agent_id: &AgentId) -> CoherenceResult<AgentGraph> {
        let slot = self.registry.slot(agent_id);
        let mut slot = slot.lock().await;
        let graph = self.resident(agent_id, &mut slot).await?;
        Ok(graph.clone())
    }

    /// Drop the agent's resident graph; the next call reloads it from the
    /// store. Returns false while the agent is busy or has an unresolved
    /// write.
    pub fn unload(&self, agent_id: &AgentId) -> bool {
        self.registry.evict(agent_id)
    }

    pub async fn agent_state(&self, agent_id: &AgentId) -> AgentState {
        self.registry.state(agent_id).await
    }

    pub fn agents(&self) -> Vec<AgentId> {
        self.registry.agent_ids()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.notifier.dead_letters()
    }

    pub fn notification_stats(&self) -> DispatcherStats {
        self.notifier.stats()
    }

    pub fn processor_stats(&self) -> ProcessorStats {
        self.processor.stats()
    }

    /// Wait until every notification queued so far has been delivered or
    /// dead-lettered.
    pub async fn flush_notifications(&self) {
        self.notifier.flush().await;
    }

    /// Reject new additions, stop the cache janitor, shut the processor down
    /// per its configured mode and drain pending notifications.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!("Coherence orchestrator shutting down");
        if let Some(janitor) = self.janitor.lock().take() {
            janitor.abort();
        }
        self.processor.shutdown().await;
        self.notifier.shutdown().await;
        tracing::info!("Coherence orchestrator stopped");
    }

    async fn add_inbound(
        &self,
        agent_id: &AgentId,
        kind: EdgeType,
        source: &str,
        target: &str,
        confidence: f64,
        metadata: Metadata,
    ) -> CoherenceResult<EdgeAddition> {
        match self
            .add_edge(agent_id, kind, source, target, confidence, metadata)
            .await
        {
            Ok(result) => Ok(EdgeAddition::added(result)),
            Err(CoherenceError::Duplicate(edge_id)) => {
                tracing::debug!(agent_id = %agent_id, edge_id = %edge_id, "Duplicate edge ignored");
                Ok(EdgeAddition::duplicate())
            }
            Err(e) => Err(e),
        }
    }

    async fn add_edge_locked(
        &self,
        agent_id: &AgentId,
        kind: EdgeType,
        source: &str,
        target: &str,
        confidence: f64,
        metadata: Metadata,
    ) -> CoherenceResult<StoryLossResult> {
        let slot = self.registry.slot(agent_id);
        let mut slot = slot.lock().await;

        // All changes go to a working copy that replaces the resident graph
        // only once it has been saved.
        let mut working = self.resident(agent_id, &mut slot).await?.clone();

        let (source_type, target_type) = kind.endpoint_types();
        let (source_id, _) = working.ensure_node(source_type, source, confidence, metadata.clone())?;
        let (target_id, _) = working.ensure_node(target_type, target, confidence, metadata.clone())?;
        let edge = Edge::new(source_id, target_id, kind, confidence)?;

        if working.is_duplicate(&edge) {
            return Err(CoherenceError::Duplicate(edge.id));
        }

        let (result, detection) =
            self.calculator
                .evaluate(agent_id, std::slice::from_ref(&edge), &working);

        working.add_edge(edge.clone())?;
        working.set_last_story_loss(result.score);
        let version = working.version();

        let mut notifications = Vec::with_capacity(3);
        if result.score > self.config.threshold {
            tracing::warn!(
                agent_id = %agent_id,
                score = result.score,
                threshold = self.config.threshold,
                "Story-loss above threshold"
            );
            notifications.push(Notification::Threshold(ThresholdEvent::new(
                agent_id.clone(),
                result.score,
                self.config.threshold,
                version,
            )));

            let mut context = Metadata::new();
            context.insert("edgeId".into(), json!(edge.id.to_hex()));
            context.insert("edgeType".into(), json!(kind.as_str()));
            context.insert("source".into(), json!(source));
            context.insert("target".into(), json!(target));
            context.insert("graphVersion".into(), json!(version));
            context.insert("threshold".into(), json!(self.config.threshold));
            context.insert(
                "findings".into(),
                json!(detection
                    .findings
                    .iter()
                    .map(|f| json!({
                        "rule": f.rule_type,
                        "severity": f.severity,
                        "explanation": f.explanation,
                    }))
                    .collect::<Vec<_>>()),
            );
            notifications.push(Notification::Reflection {
                agent_id: agent_id.clone(),
                score: result.score,
                context,
            });
        }
        notifications.push(Notification::Metrics {
            agent_id: agent_id.clone(),
            score: result.score,
            metadata,
        });

        let previous = slot.begin_write(PendingWrite {
            edge_id: edge.id.clone(),
            notifications,
        });
        if let Err(e) = self.store.save(agent_id, &working).await {
            slot.abort_write(previous);
            tracing::error!(agent_id = %agent_id, error = %e, "Failed to persist graph");
            return Err(CoherenceError::Store(e));
        }
        let snapshot = self.config.processor.consolidate_after_add.then(|| working.clone());
        let notifications = slot.commit(working);

        tracing::info!(
            agent_id = %agent_id,
            edge_id = %edge.id,
            kind = %kind,
            score = result.score,
            version,
            "Edge added"
        );
        self.dispatch(notifications);

        if let Some(snapshot) = snapshot {
            let task = ConsolidationTask::new(snapshot, Arc::clone(&self.detector));
            if let Err(e) = self.processor.try_submit(Box::new(task)) {
                tracing::debug!(agent_id = %agent_id, error = %e, "Consolidation not scheduled");
            }
        }

        Ok(result)
    }

    /// Make the agent's graph resident. A write that was cut off after it
    /// reached the store gets its notifications sent here, exactly once.
    async fn resident<'a>(
        &self,
        agent_id: &AgentId,
        slot: &'a mut AgentSlot,
    ) -> CoherenceResult<&'a AgentGraph> {
        slot.ensure_loaded(agent_id, self.store.as_ref()).await?;
        if let Some(recovered) = slot.take_recovered() {
            tracing::info!(
                agent_id = %agent_id,
                edge_id = %recovered.edge_id,
                notifications = recovered.notifications.len(),
                "Sending notifications for recovered write"
            );
            self.dispatch(recovered.notifications);
        }
        slot.graph().ok_or_else(|| {
            CoherenceError::Store(StorageError::Unavailable(format!(
                "graph for {} not resident",
                agent_id
            )))
        })
    }

    fn dispatch(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            self.notifier.enqueue(notification);
        }
    }
}

impl Drop for CoherenceOrchestrator {
    fn drop(&mut self) {
        if let Some(janitor) = self.janitor.get_mut().take() {
            janitor.abort();
        }
    }
}
