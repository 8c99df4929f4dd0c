#[path = "support/mod.rs"]
mod support;

#[path = "e2e/contradiction_flow.rs"]
mod contradiction_flow;

#[path = "e2e/rejection_and_rollback.rs"]
mod rejection_and_rollback;

#[path = "e2e/agent_concurrency.rs"]
mod agent_concurrency;

#[path = "e2e/persistence.rs"]
mod persistence;
