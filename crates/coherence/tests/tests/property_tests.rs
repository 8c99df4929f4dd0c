#[path = "property/score_bounds.rs"]
mod score_bounds;

#[path = "property/graph_invariants.rs"]
mod graph_invariants;
