use chrono::{DateTime, Utc};
use coherence_graph::{AgentGraph, AgentId, Edge};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::detector::ContradictionDetector;
use crate::types::ContradictionResult;

/// Normalized story-loss for one scored batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryLossResult {
    pub agent_id: AgentId,
    /// In [0.0, 1.0].
    pub score: f64,
    pub contradictory_count: usize,
    /// Number of candidate edges scored.
    pub total_edges: usize,
    pub confidence: f64,
    pub computed_at: DateTime<Utc>,
    /// Version of the graph the batch was scored against.
    pub graph_version: u64,
}

/// `(contradictory / total) * confidence`, clamped to [0, 1]; zero for an
/// empty batch.
pub fn story_loss(contradictory: usize, total: usize, confidence: f64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = (contradictory as f64 / total as f64) * confidence;
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

struct CacheEntry {
    result: StoryLossResult,
    graph_version: u64,
    stored_at: Instant,
}

/// Turns detection runs into scores and caches read-only queries per agent.
///
/// The mutation path ([`score`](Self::score)) always recomputes. The
/// read-only path ([`cached_score`](Self::cached_score)) audits the whole
/// graph and serves repeats from the cache until the TTL lapses or the graph
/// version moves. Expired entries are evicted lazily on read;
/// [`spawn_janitor`](Self::spawn_janitor) adds a periodic full clear.
pub struct StoryLossCalculator {
    detector: Arc<ContradictionDetector>,
    ttl: Duration,
    cache: RwLock<HashMap<AgentId, CacheEntry>>,
    detection_runs: AtomicU64,
}

impl StoryLossCalculator {
    pub fn new(detector: Arc<ContradictionDetector>, ttl: Duration) -> Self {
        Self {
            detector,
            ttl,
            cache: RwLock::new(HashMap::new()),
            detection_runs: AtomicU64::new(0),
        }
    }

    pub fn detector(&self) -> &Arc<ContradictionDetector> {
        &self.detector
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh score for a candidate batch against `graph`.
    pub fn score(&self, agent_id: &AgentId, candidates: &[Edge], graph: &AgentGraph) -> StoryLossResult {
        self.evaluate(agent_id, candidates, graph).0
    }

    /// Fresh score plus the detection run behind it. Supersedes any cached
    /// entry for the agent.
    pub fn evaluate(
        &self,
        agent_id: &AgentId,
        candidates: &[Edge],
        graph: &AgentGraph,
    ) -> (StoryLossResult, ContradictionResult) {
        let (result, detection) = self.compute(agent_id, candidates, graph);
        self.invalidate(agent_id);
        (result, detection)
    }

    /// Read-only story-loss of the whole graph, cached per agent.
    pub fn cached_score(&self, agent_id: &AgentId, graph: &AgentGraph) -> StoryLossResult {
        {
            let cache = self.cache.read();
            if let Some(entry) = cache.get(agent_id) {
                if entry.graph_version == graph.version() && entry.stored_at.elapsed() < self.ttl {
                    tracing::debug!(agent_id = %agent_id, "Story-loss cache hit");
                    return entry.result.clone();
                }
            }
        }

        tracing::debug!(agent_id = %agent_id, "Story-loss cache miss");
        let (result, _) = self.compute(agent_id, graph.edges(), graph);
        self.cache.write().insert(
            agent_id.clone(),
            CacheEntry {
                result: result.clone(),
                graph_version: graph.version(),
                stored_at: Instant::now(),
            },
        );
        result
    }

    pub fn invalidate(&self, agent_id: &AgentId) {
        self.cache.write().remove(agent_id);
    }

    /// Drop entries older than the TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut cache = self.cache.write();
        let before = cache.len();
        cache.retain(|_, entry| entry.stored_at.elapsed() < self.ttl);
        before - cache.len()
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Number of detection passes run so far.
    pub fn detection_runs(&self) -> u64 {
        self.detection_runs.load(Ordering::Relaxed)
    }

    /// Clear the whole cache every `every`, evicting expired entries first so
    /// the tick can report stale and live evictions apart. Must be called
    /// within a tokio runtime; abort the handle to stop.
    pub fn spawn_janitor(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let calculator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                ticker.tick().await;
                let expired = calculator.purge_expired();
                let live = calculator.cache_len();
                calculator.clear();
                tracing::debug!(expired, live, "Story-loss cache cleared");
            }
        })
    }

    fn compute(
        &self,
        agent_id: &AgentId,
        candidates: &[Edge],
        graph: &AgentGraph,
    ) -> (StoryLossResult, ContradictionResult) {
        self.detection_runs.fetch_add(1, Ordering::Relaxed);
        let detection = self.detector.detect(candidates, graph);
        let score = story_loss(
            detection.contradictory_count(),
            candidates.len(),
            detection.confidence,
        );
        let result = StoryLossResult {
            agent_id: agent_id.clone(),
            score,
            contradictory_count: detection.contradictory_count(),
            total_edges: candidates.len(),
            confidence: detection.confidence,
            computed_at: Utc::now(),
            graph_version: graph.version(),
        };
        (result, detection)
    }
}
