//! Coherence runtime.
//!
//! Wires the graph model and the contradiction detector into a service:
//! - [`CoherenceOrchestrator`]: per-agent single-writer graph ownership,
//!   story-loss gating of new edges, persist-then-confirm writes
//! - [`AsyncGraphProcessor`]: bounded worker pool for off-path analysis
//! - [`NotificationDispatcher`]: retrying delivery of alerts, reflection
//!   triggers and metrics, with a dead-letter queue
//! - [`CoherenceConfig`] and [`init_tracing`] for embedding services

#![deny(unsafe_code)]

pub mod collaborators;
pub mod config;
pub mod consolidation;
pub mod error;
pub mod notifications;
pub mod orchestrator;
pub mod processor;
pub mod registry;
pub mod telemetry;

pub use collaborators::{
    AlertSink, Collaborators, LoggingAlertSink, LoggingMetricsRecorder, LoggingReflectionTrigger,
    MetricsRecorder, ReflectionTrigger, ThresholdEvent, STORY_LOSS_THRESHOLD_EVENT,
};
pub use config::{
    CacheConfig, CoherenceConfig, LoggingConfig, NotificationConfig, ProcessorConfig, ShutdownMode,
};
pub use consolidation::ConsolidationTask;
pub use error::{CoherenceError, CoherenceResult, CollaboratorError, ProcessorError};
pub use notifications::{DeadLetter, DispatcherStats, Notification, NotificationDispatcher};
pub use orchestrator::{CoherenceOrchestrator, EdgeAddition};
pub use processor::{AsyncGraphProcessor, FnTask, GraphTask, ProcessorStats, TaskError};
pub use registry::{AgentRegistry, AgentSlot, AgentState, PendingWrite};
pub use telemetry::init_tracing;
