use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::error::ValidationError;

/// Caller-supplied context attached to nodes and carried into notifications.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Content-addressed identifier: a BLAKE3 digest over the fields that define
/// an element, so resubmitting the same element always yields the same id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId([u8; 32]);

/// Node identifier.
pub type NodeId = ElementId;
/// Edge identifier.
pub type EdgeId = ElementId;

impl ElementId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn hash(data: &[u8]) -> Self {
        Self::hash_fields(&[data])
    }

    /// Hash a sequence of fields. Each field is length-prefixed so that
    /// `("ab", "c")` and `("a", "bc")` never collide.
    pub fn hash_fields(fields: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for field in fields {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Full 64-character lowercase hex form, as persisted.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in &self.0 {
            let _ = write!(out, "{:02x}", byte);
        }
        out
    }

    fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(12);
        hex
    }
}

impl FromStr for ElementId {
    type Err = ElementIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.as_bytes();
        if digits.len() != 64 {
            return Err(ElementIdError::Length(digits.len()));
        }
        let mut bytes = [0u8; 32];
        for (i, pair) in digits.chunks_exact(2).enumerate() {
            let hi = hex_value(pair[0]).ok_or(ElementIdError::Digit(i * 2))?;
            let lo = hex_value(pair[1]).ok_or(ElementIdError::Digit(i * 2 + 1))?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementId").field(&self.short()).finish()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

impl Serialize for ElementId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Why a persisted id failed to parse.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ElementIdError {
    #[error("id must be 64 hex digits, got {0}")]
    Length(usize),
    #[error("non-hex digit at position {0}")]
    Digit(usize),
}

/// Identifier of the agent that owns a graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What a node represents in the agent's narrative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Fact,
    Goal,
    Action,
    Belief,
    Event,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        NodeType::Fact,
        NodeType::Goal,
        NodeType::Action,
        NodeType::Belief,
        NodeType::Event,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Goal => "goal",
            Self::Action => "action",
            Self::Belief => "belief",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fact" => Ok(Self::Fact),
            "goal" => Ok(Self::Goal),
            "action" => Ok(Self::Action),
            "belief" => Ok(Self::Belief),
            "event" => Ok(Self::Event),
            _ => Err(ValidationError::MalformedKind(s.to_string())),
        }
    }
}

/// The relation an edge asserts between two nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Belief,
    Action,
    Causal,
    Temporal,
    Contradiction,
}

impl EdgeType {
    pub const ALL: [EdgeType; 5] = [
        EdgeType::Belief,
        EdgeType::Action,
        EdgeType::Causal,
        EdgeType::Temporal,
        EdgeType::Contradiction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Belief => "belief",
            Self::Action => "action",
            Self::Causal => "causal",
            Self::Temporal => "temporal",
            Self::Contradiction => "contradiction",
        }
    }

    /// Node types used for the source and target when an edge of this kind
    /// is submitted by content alone.
    pub fn endpoint_types(&self) -> (NodeType, NodeType) {
        match self {
            Self::Belief | Self::Contradiction => (NodeType::Belief, NodeType::Belief),
            Self::Action => (NodeType::Action, NodeType::Event),
            Self::Causal | Self::Temporal => (NodeType::Event, NodeType::Event),
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "belief" => Ok(Self::Belief),
            "action" => Ok(Self::Action),
            "causal" => Ok(Self::Causal),
            "temporal" => Ok(Self::Temporal),
            "contradiction" => Ok(Self::Contradiction),
            _ => Err(ValidationError::MalformedKind(s.to_string())),
        }
    }
}

/// Check that a confidence or weight value is a finite number in [0, 1].
pub(crate) fn check_unit_interval(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange { field, value })
    }
}
