//! Worker configuration

use crate::error::{Result, WorkerError};
use std::time::Duration;

/// Environment variable holding the storage connection string
pub const CONNECTION_STRING_ENV: &str = "STORAGE_CONNECTION_STRING";

/// Queue polled when none is configured
pub const DEFAULT_QUEUE_NAME: &str = "demo1";

/// Storage REST API version sent with every request
pub const DEFAULT_API_VERSION: &str = "2020-04-08";

/// HTTP settings for storage calls
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub api_version: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }
}

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between dequeue attempts
    pub poll_interval: Duration,

    /// Queue to pull jobs from
    pub queue_name: String,

    /// Upper bound on jobs running at once
    pub max_concurrent_jobs: usize,

    /// Handler used when a payload does not name one
    pub default_handler: String,

    /// Storage HTTP settings
    pub transport: TransportConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            max_concurrent_jobs: 4,
            default_handler: "echo".to_string(),
            transport: TransportConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create a new config builder
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }
}

/// Builder for WorkerConfig
#[derive(Default)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    /// Set poll interval
    pub fn poll_interval(mut self, duration: Duration) -> Self {
        self.config.poll_interval = duration;
        self
    }

    /// Set poll interval in seconds
    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval = Duration::from_secs(secs);
        self
    }

    pub fn queue_name(mut self, name: &str) -> Self {
        self.config.queue_name = name.to_string();
        self
    }

    /// Set the concurrency limit (at least 1)
    pub fn max_concurrent_jobs(mut self, limit: usize) -> Self {
        self.config.max_concurrent_jobs = limit.max(1);
        self
    }

    pub fn default_handler(mut self, name: &str) -> Self {
        self.config.default_handler = name.to_string();
        self
    }

    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.config.transport.request_timeout = duration;
        self
    }

    /// Build the config
    pub fn build(self) -> WorkerConfig {
        self.config
    }
}

/// Read the storage connection string from the environment
pub fn connection_string_from_env() -> Result<String> {
    std::env::var(CONNECTION_STRING_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| WorkerError::ConfigError(format!("{} not set", CONNECTION_STRING_ENV)))
}
