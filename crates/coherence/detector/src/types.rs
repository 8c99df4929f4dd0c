use coherence_graph::{Edge, EdgeId};
use serde::{Deserialize, Serialize};

/// Which check produced a finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Negation,
    CausalOrder,
    TemporalWindow,
    LogicalConsistency,
    CausalPlausibility,
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Negation => write!(f, "negation"),
            Self::CausalOrder => write!(f, "causal order"),
            Self::TemporalWindow => write!(f, "temporal window"),
            Self::LogicalConsistency => write!(f, "logical consistency"),
            Self::CausalPlausibility => write!(f, "causal plausibility"),
        }
    }
}

/// A single detected inconsistency between a candidate edge and the graph.
/// Ephemeral: produced per detection run, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContradictionFinding {
    pub edge_id: EdgeId,
    pub rule_type: RuleType,
    /// Severity in [0.0, 1.0].
    pub severity: f64,
    pub explanation: String,
}

impl ContradictionFinding {
    pub fn new(
        edge_id: EdgeId,
        rule_type: RuleType,
        severity: f64,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            edge_id,
            rule_type,
            severity: severity.clamp(0.0, 1.0),
            explanation: explanation.into(),
        }
    }
}

/// Per-candidate outcome, index-aligned with the detector input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateVerdict {
    pub edge_id: EdgeId,
    pub contradictory: bool,
    /// False when an endpoint was missing and no rule could run.
    pub evaluated: bool,
}

/// Output of one detection run over a batch of candidate edges.
#[derive(Clone, Debug)]
pub struct ContradictionResult {
    /// Candidates with at least one finding, in input order.
    pub contradictory_edges: Vec<Edge>,
    /// All findings, grouped by candidate in input order.
    pub findings: Vec<ContradictionFinding>,
    /// Mean finding severity; 1.0 when nothing was found.
    pub confidence: f64,
    pub verdicts: Vec<CandidateVerdict>,
}

impl Default for ContradictionResult {
    fn default() -> Self {
        Self {
            contradictory_edges: Vec::new(),
            findings: Vec::new(),
            confidence: 1.0,
            verdicts: Vec::new(),
        }
    }
}

impl ContradictionResult {
    pub fn total_candidates(&self) -> usize {
        self.verdicts.len()
    }

    pub fn contradictory_count(&self) -> usize {
        self.contradictory_edges.len()
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Tunables for the built-in rules.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Max timestamp gap, in seconds, for nodes joined by a Temporal edge.
    #[serde(default = "default_temporal_window_secs")]
    pub temporal_window_secs: i64,
    /// Minimum length of a shared token for the negation rule.
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            temporal_window_secs: default_temporal_window_secs(),
            min_token_len: default_min_token_len(),
        }
    }
}

fn default_temporal_window_secs() -> i64 {
    3600
}

fn default_min_token_len() -> usize {
    4
}
