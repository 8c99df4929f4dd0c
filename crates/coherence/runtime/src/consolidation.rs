use async_trait::async_trait;
use coherence_detector::ContradictionDetector;
use coherence_graph::AgentGraph;
use std::sync::Arc;

use crate::processor::{GraphTask, TaskError};

/// Whole-graph coherence audit over a snapshot of one agent's graph.
///
/// Runs off the edge-addition path and only reports; it never mutates the
/// graph or touches the score cache.
pub struct ConsolidationTask {
    name: String,
    graph: AgentGraph,
    detector: Arc<ContradictionDetector>,
}

impl ConsolidationTask {
    pub fn new(graph: AgentGraph, detector: Arc<ContradictionDetector>) -> Self {
        Self {
            name: format!("consolidate:{}", graph.agent_id()),
            graph,
            detector,
        }
    }
}

#[async_trait]
impl GraphTask for ConsolidationTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(self: Box<Self>) -> Result<(), TaskError> {
        let ConsolidationTask {
            graph, detector, ..
        } = *self;

        let audit = tokio::task::spawn_blocking(move || {
            let result = detector.detect(graph.edges(), &graph);
            (graph, result)
        })
        .await
        .map_err(|e| TaskError::new(format!("audit panicked: {}", e)))?;
        let (graph, result) = audit;

        let unevaluated = result.verdicts.iter().filter(|v| !v.evaluated).count();
        if result.is_clean() {
            tracing::debug!(
                agent_id = %graph.agent_id(),
                version = graph.version(),
                edges = graph.edge_count(),
                "Consolidation audit clean"
            );
        } else {
            tracing::info!(
                agent_id = %graph.agent_id(),
                version = graph.version(),
                edges = graph.edge_count(),
                contradictory = result.contradictory_count(),
                findings = result.findings.len(),
                unevaluated,
                confidence = result.confidence,
                "Consolidation audit found contradictions"
            );
        }
        Ok(())
    }
}
