#![deny(unsafe_code)]
//! # coherence-detector
//!
//! Contradiction detection and story-loss scoring for narrative graphs.
//!
//! Candidate edges are checked one at a time, in parallel across the batch,
//! by an ordered list of [`ContradictionRule`]s:
//!
//! - **Negation** (Belief edges): negated statement sharing vocabulary with
//!   its counterpart, severity 0.8
//! - **Causal order** (Causal edges): effect timestamped before its cause,
//!   severity 1.0
//! - **Temporal window** (Temporal edges): "simultaneous" nodes further apart
//!   than the configured window, severity 0.6
//! - **Logical consistency** / **causal plausibility**: reserved, never report
//!
//! The [`StoryLossCalculator`] folds a detection run into one score:
//!
//! ```text
//! score = clamp((contradictory / total) * confidence, 0, 1)
//! ```

pub mod detector;
pub mod lexicon;
pub mod rules;
pub mod story_loss;
pub mod types;

pub use detector::ContradictionDetector;
pub use rules::{
    CausalOrderRule, CausalPlausibilityRule, ContradictionRule, EdgeContext,
    LogicalConsistencyRule, NegationRule, TemporalWindowRule,
};
pub use story_loss::{story_loss, StoryLossCalculator, StoryLossResult};
pub use types::{
    CandidateVerdict, ContradictionFinding, ContradictionResult, DetectorConfig, RuleType,
};
