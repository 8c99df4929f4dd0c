use coherence_graph::{AgentGraph, Edge};
use rayon::prelude::*;

use crate::rules::{default_rules, ContradictionRule, EdgeContext};
use crate::types::{CandidateVerdict, ContradictionFinding, ContradictionResult, DetectorConfig};

/// Classifies candidate edges as contradictory or not against a graph.
///
/// Candidates are checked in parallel; results always line up with the
/// input order. Detection does no I/O and never fails: a candidate whose
/// endpoints are missing from the graph is reported as not evaluated and
/// contributes no findings.
pub struct ContradictionDetector {
    rules: Vec<Box<dyn ContradictionRule>>,
}

impl ContradictionDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self::with_rules(default_rules(config))
    }

    pub fn with_default_config() -> Self {
        Self::new(&DetectorConfig::default())
    }

    pub fn with_rules(rules: Vec<Box<dyn ContradictionRule>>) -> Self {
        Self { rules }
    }

    /// Append a rule after the existing ones.
    pub fn push_rule(&mut self, rule: Box<dyn ContradictionRule>) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Run every applicable rule against every candidate.
    pub fn detect(&self, candidates: &[Edge], graph: &AgentGraph) -> ContradictionResult {
        let outcomes: Vec<(CandidateVerdict, Vec<ContradictionFinding>)> = candidates
            .par_iter()
            .map(|edge| self.check_edge(edge, graph))
            .collect();

        let mut result = ContradictionResult::default();
        for (edge, (verdict, findings)) in candidates.iter().zip(outcomes) {
            if verdict.contradictory {
                result.contradictory_edges.push(edge.clone());
            }
            result.findings.extend(findings);
            result.verdicts.push(verdict);
        }

        result.confidence = if result.findings.is_empty() {
            1.0
        } else {
            result.findings.iter().map(|f| f.severity).sum::<f64>() / result.findings.len() as f64
        };

        tracing::debug!(
            agent_id = %graph.agent_id(),
            candidates = candidates.len(),
            contradictory = result.contradictory_edges.len(),
            findings = result.findings.len(),
            confidence = result.confidence,
            "Contradiction detection finished"
        );
        result
    }

    fn check_edge(
        &self,
        edge: &Edge,
        graph: &AgentGraph,
    ) -> (CandidateVerdict, Vec<ContradictionFinding>) {
        let Some((source, target)) = graph.endpoints(edge) else {
            tracing::debug!(
                edge_id = %edge.id,
                "Candidate endpoint missing from graph, skipping evaluation"
            );
            return (
                CandidateVerdict {
                    edge_id: edge.id.clone(),
                    contradictory: false,
                    evaluated: false,
                },
                Vec::new(),
            );
        };

        let ctx = EdgeContext {
            edge,
            source,
            target,
            graph,
        };
        let findings: Vec<ContradictionFinding> = self
            .rules
            .iter()
            .filter(|rule| rule.applies_to(edge.edge_type))
            .flat_map(|rule| rule.evaluate(&ctx))
            .collect();

        for finding in &findings {
            tracing::debug!(
                edge_id = %finding.edge_id,
                rule = %finding.rule_type,
                severity = finding.severity,
                explanation = %finding.explanation,
                "Contradiction finding"
            );
        }

        (
            CandidateVerdict {
                edge_id: edge.id.clone(),
                contradictory: !findings.is_empty(),
                evaluated: true,
            },
            findings,
        )
    }
}

impl Default for ContradictionDetector {
    fn default() -> Self {
        Self::with_default_config()
    }
}
