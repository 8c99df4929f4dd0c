//! Configuration for the coherence runtime

use coherence_detector::DetectorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoherenceError;

/// Top-level runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoherenceConfig {
    /// Story-loss above this fires alerting and self-reflection
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Upper bound on a single edge addition, store I/O included
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub processor: ProcessorConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CoherenceConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            request_timeout_ms: default_request_timeout_ms(),
            detector: DetectorConfig::default(),
            cache: CacheConfig::default(),
            processor: ProcessorConfig::default(),
            notifications: NotificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Story-loss cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Lifetime of a cached read-only score
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    /// Interval of the full-clear fallback; 0 disables it
    #[serde(default = "default_clear_interval")]
    pub clear_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl(),
            clear_interval_secs: default_clear_interval(),
        }
    }
}

/// What happens to queued background tasks on shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownMode {
    /// Stop intake, finish everything already queued
    #[default]
    Drain,
    /// Stop intake, abort in-flight tasks, discard the rest
    Drop,
}

/// Background processor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Default wait for queue space on `submit`
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,

    #[serde(default)]
    pub shutdown: ShutdownMode,

    /// Queue a whole-graph consolidation audit after every accepted edge
    #[serde(default = "default_true")]
    pub consolidate_after_add: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            submit_timeout_ms: default_submit_timeout_ms(),
            shutdown: ShutdownMode::default(),
            consolidate_after_add: true,
        }
    }
}

/// Notification delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Delivery attempts per collaborator before dead-lettering
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff grows linearly: attempt * retry_backoff_ms
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            dead_letter_capacity: default_dead_letter_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.15
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_clear_interval() -> u64 {
    3600
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    256
}

fn default_submit_timeout_ms() -> u64 {
    250
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    50
}

fn default_dead_letter_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CoherenceConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `COHERENCE_`-prefixed environment variables (`__` separates levels,
    /// e.g. `COHERENCE_PROCESSOR__WORKERS=8`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&CoherenceConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("COHERENCE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject settings the runtime cannot operate with.
    pub fn validate(&self) -> Result<(), CoherenceError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(CoherenceError::Config(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.processor.workers == 0 {
            return Err(CoherenceError::Config("processor.workers must be > 0".into()));
        }
        if self.processor.queue_capacity == 0 {
            return Err(CoherenceError::Config(
                "processor.queue_capacity must be > 0".into(),
            ));
        }
        if self.notifications.channel_capacity == 0 {
            return Err(CoherenceError::Config(
                "notifications.channel_capacity must be > 0".into(),
            ));
        }
        if self.notifications.max_attempts == 0 {
            return Err(CoherenceError::Config(
                "notifications.max_attempts must be > 0".into(),
            ));
        }
        if self.detector.temporal_window_secs < 0 {
            return Err(CoherenceError::Config(
                "detector.temporal_window_secs must be >= 0".into(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }
}
