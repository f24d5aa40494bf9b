//! Verification event batching

use std::time::Duration;

use keygate_verify::EventBatchConfig;
use serde::Deserialize;
use serde::Serialize;

use super::error::parse_env;
use super::error::ConfigError;
use super::EnvLookup;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Emit one event per evaluated verification
    pub enabled: bool,
    /// Rows per flush
    pub batch_size: usize,
    /// Rows buffered before new ones are dropped
    pub buffer_size: usize,
    /// Maximum delay before a partial batch is flushed, in milliseconds
    pub flush_interval_ms: u64,
    /// Datasource verification events are filed under
    pub datasource: String,
}

impl EventsConfig {
    pub fn apply_env_overrides(&mut self, env: EnvLookup<'_>) -> Result<(), ConfigError> {
        if let Some(val) = env("KEYGATE_EVENT_BATCH_SIZE") {
            self.batch_size = parse_env("KEYGATE_EVENT_BATCH_SIZE", &val)?;
        }
        if let Some(val) = env("KEYGATE_EVENT_BUFFER_SIZE") {
            self.buffer_size = parse_env("KEYGATE_EVENT_BUFFER_SIZE", &val)?;
        }
        if let Some(val) = env("KEYGATE_EVENT_FLUSH_INTERVAL_MS") {
            self.flush_interval_ms = parse_env("KEYGATE_EVENT_FLUSH_INTERVAL_MS", &val)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("events.batch_size", self.batch_size, "must be at least 1"));
        }
        if self.buffer_size < self.batch_size {
            return Err(ConfigError::invalid(
                "events.buffer_size",
                self.buffer_size,
                format!("must be at least batch_size ({})", self.batch_size),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::invalid("events.flush_interval_ms", self.flush_interval_ms, "must be greater than 0"));
        }
        if self.datasource.trim().is_empty() {
            return Err(ConfigError::invalid("events.datasource", &self.datasource, "must not be empty"));
        }
        Ok(())
    }

    pub fn batch_config(&self) -> EventBatchConfig {
        EventBatchConfig {
            batch_size: self.batch_size,
            buffer_size: self.buffer_size,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            datasource: self.datasource.clone(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: 1_000,
            buffer_size: 10_000,
            flush_interval_ms: 1_000,
            datasource: "key_verifications".to_string(),
        }
    }
}
