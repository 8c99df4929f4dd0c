use chrono::Duration;
use coherence_graph::{AgentGraph, Edge, EdgeType, Node};

use crate::lexicon::{contains_negation, shared_vocabulary, tokenize};
use crate::types::{ContradictionFinding, DetectorConfig, RuleType};

pub const NEGATION_SEVERITY: f64 = 0.8;
pub const CAUSAL_ORDER_SEVERITY: f64 = 1.0;
pub const TEMPORAL_WINDOW_SEVERITY: f64 = 0.6;

/// A candidate edge with its resolved endpoints.
pub struct EdgeContext<'a> {
    pub edge: &'a Edge,
    pub source: &'a Node,
    pub target: &'a Node,
    pub graph: &'a AgentGraph,
}

/// One independent contradiction check.
///
/// Rules are pure and must not fail: a check that cannot decide reports no
/// finding.
pub trait ContradictionRule: Send + Sync {
    fn rule_type(&self) -> RuleType;

    /// Whether the rule looks at edges of this kind at all.
    fn applies_to(&self, edge_type: EdgeType) -> bool;

    fn evaluate(&self, ctx: &EdgeContext<'_>) -> Vec<ContradictionFinding>;
}

/// The built-in rule set, in evaluation order.
pub fn default_rules(config: &DetectorConfig) -> Vec<Box<dyn ContradictionRule>> {
    vec![
        Box::new(NegationRule::new(config.min_token_len)),
        Box::new(CausalOrderRule),
        Box::new(TemporalWindowRule::new(Duration::seconds(
            config.temporal_window_secs,
        ))),
        Box::new(LogicalConsistencyRule),
        Box::new(CausalPlausibilityRule),
    ]
}

/// Belief edges whose endpoints share vocabulary while one side carries a
/// negation marker.
pub struct NegationRule {
    min_token_len: usize,
}

impl NegationRule {
    pub fn new(min_token_len: usize) -> Self {
        Self { min_token_len }
    }
}

impl ContradictionRule for NegationRule {
    fn rule_type(&self) -> RuleType {
        RuleType::Negation
    }

    fn applies_to(&self, edge_type: EdgeType) -> bool {
        edge_type == EdgeType::Belief
    }

    fn evaluate(&self, ctx: &EdgeContext<'_>) -> Vec<ContradictionFinding> {
        let source = tokenize(&ctx.source.content);
        let target = tokenize(&ctx.target.content);
        if !contains_negation(&source) && !contains_negation(&target) {
            return Vec::new();
        }
        let shared = shared_vocabulary(&source, &target, self.min_token_len);
        if shared.is_empty() {
            return Vec::new();
        }
        vec![ContradictionFinding::new(
            ctx.edge.id.clone(),
            RuleType::Negation,
            NEGATION_SEVERITY,
            format!(
                "negated statement {:?} overlaps {:?} on [{}]",
                ctx.source.content,
                ctx.target.content,
                shared.join(", ")
            ),
        )]
    }
}

/// Causal edges must not point backwards in time.
pub struct CausalOrderRule;

impl ContradictionRule for CausalOrderRule {
    fn rule_type(&self) -> RuleType {
        RuleType::CausalOrder
    }

    fn applies_to(&self, edge_type: EdgeType) -> bool {
        edge_type == EdgeType::Causal
    }

    fn evaluate(&self, ctx: &EdgeContext<'_>) -> Vec<ContradictionFinding> {
        if ctx.source.timestamp <= ctx.target.timestamp {
            return Vec::new();
        }
        vec![ContradictionFinding::new(
            ctx.edge.id.clone(),
            RuleType::CausalOrder,
            CAUSAL_ORDER_SEVERITY,
            format!(
                "effect precedes cause: {:?} at {} is after {:?} at {}",
                ctx.source.content,
                ctx.source.timestamp.to_rfc3339(),
                ctx.target.content,
                ctx.target.timestamp.to_rfc3339()
            ),
        )]
    }
}

/// Temporal edges assert simultaneity within a window.
pub struct TemporalWindowRule {
    window: Duration,
}

impl TemporalWindowRule {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }
}

impl ContradictionRule for TemporalWindowRule {
    fn rule_type(&self) -> RuleType {
        RuleType::TemporalWindow
    }

    fn applies_to(&self, edge_type: EdgeType) -> bool {
        edge_type == EdgeType::Temporal
    }

    fn evaluate(&self, ctx: &EdgeContext<'_>) -> Vec<ContradictionFinding> {
        let (earlier, later) = if ctx.source.timestamp <= ctx.target.timestamp {
            (ctx.source.timestamp, ctx.target.timestamp)
        } else {
            (ctx.target.timestamp, ctx.source.timestamp)
        };
        let gap = later - earlier;
        if gap <= self.window {
            return Vec::new();
        }
        vec![ContradictionFinding::new(
            ctx.edge.id.clone(),
            RuleType::TemporalWindow,
            TEMPORAL_WINDOW_SEVERITY,
            format!(
                "asserted simultaneous but {}s apart (window {}s)",
                gap.num_seconds(),
                self.window.num_seconds()
            ),
        )]
    }
}

/// Reserved extension point.
pub struct LogicalConsistencyRule;

impl ContradictionRule for LogicalConsistencyRule {
    fn rule_type(&self) -> RuleType {
        RuleType::LogicalConsistency
    }

    fn applies_to(&self, _edge_type: EdgeType) -> bool {
        true
    }

    fn evaluate(&self, _ctx: &EdgeContext<'_>) -> Vec<ContradictionFinding> {
        Vec::new()
    }
}

/// Reserved extension point.
pub struct CausalPlausibilityRule;

impl ContradictionRule for CausalPlausibilityRule {
    fn rule_type(&self) -> RuleType {
        RuleType::CausalPlausibility
    }

    fn applies_to(&self, edge_type: EdgeType) -> bool {
        edge_type == EdgeType::Causal
    }

    fn evaluate(&self, _ctx: &EdgeContext<'_>) -> Vec<ContradictionFinding> {
        Vec::new()
    }
}
