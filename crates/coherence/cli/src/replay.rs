use coherence_graph::{AgentId, EdgeType, Metadata};
use coherence_runtime::{CoherenceError, CoherenceOrchestrator};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::str::FromStr;

/// One line of replay input.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRequest {
    pub agent_id: AgentId,
    pub kind: String,
    pub source: String,
    pub target: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

fn default_confidence() -> f64 {
    1.0
}

/// One line of replay output.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayOutcome {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    pub added: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_version: Option<u64>,
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub lines: usize,
    pub added: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub above_threshold: usize,
}

/// Feed every request in `input` through the orchestrator, writing one JSON
/// outcome per request to `out`. Blank lines and `#` comments are skipped;
/// a bad line is reported and replay continues.
pub async fn replay<R: BufRead, W: Write>(
    orchestrator: &CoherenceOrchestrator,
    input: R,
    out: &mut W,
) -> anyhow::Result<ReplaySummary> {
    let threshold = orchestrator.config().threshold;
    let mut summary = ReplaySummary::default();

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        summary.lines += 1;

        let mut outcome = ReplayOutcome {
            line: index + 1,
            ..ReplayOutcome::default()
        };
        match apply(orchestrator, trimmed, &mut outcome).await {
            Ok(()) if outcome.added => {
                summary.added += 1;
                if outcome.score.is_some_and(|s| s > threshold) {
                    summary.above_threshold += 1;
                }
            }
            Ok(()) => summary.duplicates += 1,
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(line = outcome.line, error = %e, "Replay request failed");
                outcome.error = Some(e.to_string());
            }
        }

        serde_json::to_writer(&mut *out, &outcome)?;
        writeln!(out)?;
    }

    out.flush()?;
    Ok(summary)
}

async fn apply(
    orchestrator: &CoherenceOrchestrator,
    line: &str,
    outcome: &mut ReplayOutcome,
) -> anyhow::Result<()> {
    let request: ReplayRequest = serde_json::from_str(line)?;
    outcome.agent_id = Some(request.agent_id.clone());
    let kind = EdgeType::from_str(&request.kind)?;

    match orchestrator
        .add_edge(
            &request.agent_id,
            kind,
            &request.source,
            &request.target,
            request.confidence,
            request.metadata,
        )
        .await
    {
        Ok(result) => {
            outcome.added = true;
            outcome.score = Some(result.score);
            outcome.graph_version = Some(result.graph_version);
            Ok(())
        }
        Err(CoherenceError::Duplicate(_)) => {
            outcome.duplicate = true;
            outcome.score = Some(0.0);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
