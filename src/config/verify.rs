//! Verification request handling

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use super::error::parse_env;
use super::error::ConfigError;
use super::EnvLookup;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Deadline for one verification, in milliseconds
    pub timeout_ms: u64,
    /// Prefix of the `docs` link in error bodies; the error code is appended
    pub docs_base_url: String,
}

impl VerifyConfig {
    pub fn apply_env_overrides(&mut self, env: EnvLookup<'_>) -> Result<(), ConfigError> {
        if let Some(val) = env("KEYGATE_VERIFY_TIMEOUT_MS") {
            self.timeout_ms = parse_env("KEYGATE_VERIFY_TIMEOUT_MS", &val)?;
        }
        if let Some(val) = env("KEYGATE_DOCS_BASE_URL") {
            self.docs_base_url = val;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::invalid("verify.timeout_ms", self.timeout_ms, "must be greater than 0"));
        }
        if self.docs_base_url.trim().is_empty() {
            return Err(ConfigError::invalid("verify.docs_base_url", &self.docs_base_url, "must not be empty"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            docs_base_url: "https://keygate.dev/docs/api-reference/errors/code".to_string(),
        }
    }
}
