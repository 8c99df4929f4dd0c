//! Property tests: node dedup is idempotent, versions only move forward on
//! successful mutations, and duplicate edges never change the graph.

use coherence_graph::{AgentGraph, AgentId, Edge, EdgeType, InMemoryGraphStore, Metadata, NodeType};
use coherence_runtime::{CoherenceConfig, CoherenceOrchestrator};
use proptest::prelude::*;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn arb_node_type() -> impl Strategy<Value = NodeType> {
    prop_oneof![
        Just(NodeType::Fact),
        Just(NodeType::Goal),
        Just(NodeType::Action),
        Just(NodeType::Belief),
        Just(NodeType::Event),
    ]
}

/// Small vocabulary so sequences revisit the same content often.
fn arb_content() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("door is open".to_string()),
        Just("door is not open".to_string()),
        Just("light is on".to_string()),
        Just("never give up".to_string()),
        "[a-d]{1,3}",
    ]
}

#[derive(Clone, Debug)]
enum Op {
    Node(NodeType, String),
    Edge(usize, usize, EdgeType),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (arb_node_type(), arb_content()).prop_map(|(t, c)| Op::Node(t, c)),
        (0usize..16, 0usize..16, prop_oneof![
            Just(EdgeType::Belief),
            Just(EdgeType::Causal),
            Just(EdgeType::Temporal),
        ])
            .prop_map(|(s, t, k)| Op::Edge(s, t, k)),
    ]
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Ensuring the same (type, content) twice yields one node and one id.
    #[test]
    fn ensure_node_is_idempotent(
        node_type in arb_node_type(),
        content in arb_content(),
        repeats in 2usize..6,
    ) {
        let mut graph = AgentGraph::new(AgentId::new("idem"));
        let (first, created) = graph.ensure_node(node_type, &content, 0.5, Metadata::new()).unwrap();
        prop_assert!(created);
        let version = graph.version();
        for _ in 1..repeats {
            let (id, created) = graph.ensure_node(node_type, &content, 0.9, Metadata::new()).unwrap();
            prop_assert_eq!(&id, &first);
            prop_assert!(!created);
        }
        prop_assert_eq!(graph.node_count(), 1);
        prop_assert_eq!(graph.version(), version);
    }

    /// Successful mutations strictly increase the version; rejected ones
    /// leave it untouched.
    #[test]
    fn version_is_monotonic(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut graph = AgentGraph::new(AgentId::new("mono"));
        let mut ids = Vec::new();
        for op in ops {
            let before = graph.version();
            let changed = match op {
                Op::Node(t, c) => {
                    let (id, created) = graph.ensure_node(t, &c, 1.0, Metadata::new()).unwrap();
                    if created {
                        ids.push(id);
                    }
                    created
                }
                Op::Edge(s, t, kind) => {
                    if ids.is_empty() {
                        false
                    } else {
                        let source = ids[s % ids.len()].clone();
                        let target = ids[t % ids.len()].clone();
                        let edge = Edge::new(source, target, kind, 1.0).unwrap();
                        graph.add_edge(edge).is_ok()
                    }
                }
            };
            if changed {
                prop_assert!(graph.version() > before);
            } else {
                prop_assert_eq!(graph.version(), before);
            }
        }
    }

    /// Through the orchestrator, re-adding any accepted edge is reported as
    /// not added and leaves the graph version unchanged.
    #[test]
    fn duplicate_additions_never_bump_version(
        pairs in prop::collection::vec((arb_content(), arb_content()), 1..8),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let orch = CoherenceOrchestrator::new(
                CoherenceConfig::default(),
                Arc::new(InMemoryGraphStore::new()),
            )
            .unwrap();
            let agent = AgentId::new("dup-prop");

            for (source, target) in &pairs {
                orch.add_belief_edge(&agent, source, target, 1.0, Metadata::new())
                    .await
                    .unwrap();
            }
            let version = orch.graph_snapshot(&agent).await.unwrap().version();

            for (source, target) in &pairs {
                let again = orch
                    .add_belief_edge(&agent, source, target, 1.0, Metadata::new())
                    .await
                    .unwrap();
                assert!(!again.added);
                assert_eq!(again.score, 0.0);
            }
            assert_eq!(orch.graph_snapshot(&agent).await.unwrap().version(), version);
            orch.shutdown().await;
        });
    }
}
