//! Rate limiter tuning

use keygate_coordination::WindowRateLimiterConfig;
use keygate_core::MAX_CAS_RETRIES;
use keygate_core::MIN_RATE_LIMIT_WINDOW_MS;
use serde::Deserialize;
use serde::Serialize;

use super::error::parse_env;
use super::error::ConfigError;
use super::EnvLookup;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// CAS attempts before a contended window denies the request
    pub max_cas_retries: u32,
    /// Smallest window a credential may declare, in milliseconds
    pub min_window_ms: u64,
}

impl RateLimitConfig {
    pub fn apply_env_overrides(&mut self, env: EnvLookup<'_>) -> Result<(), ConfigError> {
        if let Some(val) = env("KEYGATE_MAX_CAS_RETRIES") {
            self.max_cas_retries = parse_env("KEYGATE_MAX_CAS_RETRIES", &val)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cas_retries == 0 {
            return Err(ConfigError::invalid("rate_limit.max_cas_retries", self.max_cas_retries, "must be at least 1"));
        }
        if self.max_cas_retries > MAX_CAS_RETRIES {
            return Err(ConfigError::invalid(
                "rate_limit.max_cas_retries",
                self.max_cas_retries,
                format!("must not exceed {}", MAX_CAS_RETRIES),
            ));
        }
        if self.min_window_ms == 0 {
            return Err(ConfigError::invalid("rate_limit.min_window_ms", self.min_window_ms, "must be greater than 0"));
        }
        Ok(())
    }

    pub fn limiter_config(&self) -> WindowRateLimiterConfig {
        WindowRateLimiterConfig {
            max_cas_retries: self.max_cas_retries,
            min_window_ms: self.min_window_ms,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_cas_retries: MAX_CAS_RETRIES,
            min_window_ms: MIN_RATE_LIMIT_WINDOW_MS,
        }
    }
}
