//! Centralized application configuration
//!
//! Layered: hardcoded defaults, then an optional TOML file, then `KEYGATE_*`
//! environment variables. [`AppConfig::validate`] runs last.

pub mod error;
pub mod events;
pub mod rate_limit;
pub mod server;
pub mod verify;

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

pub use error::ConfigError;
pub use events::EventsConfig;
pub use rate_limit::RateLimitConfig;
pub use server::ServerConfig;
pub use verify::VerifyConfig;

/// Lookup used for environment overrides; `std::env::var` in production.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

impl AppConfig {
    /// Load configuration with layered approach:
    /// 1. Start with defaults
    /// 2. Load from TOML file if one is given
    /// 3. Override with environment variables
    /// 4. Validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::from_toml_file(path)?
            }
            None => {
                tracing::info!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides(&|key: &str| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::invalid("config_file", path.display(), format!("Failed to read file: {}", e))
        })?;
        Self::from_toml_str(&contents)
            .map_err(|e| ConfigError::invalid("config_file", path.display(), e.to_string()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::invalid("config", "<toml>", format!("Failed to parse TOML: {}", e)))
    }

    /// Apply environment variable overrides to existing configuration
    pub fn apply_env_overrides(&mut self, env: EnvLookup<'_>) -> Result<(), ConfigError> {
        self.server.apply_env_overrides(env)?;
        self.verify.apply_env_overrides(env)?;
        self.rate_limit.apply_env_overrides(env)?;
        self.events.apply_env_overrides(env)?;
        Ok(())
    }

    /// Check cross-field constraints and value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.verify.validate()?;
        self.rate_limit.validate()?;
        self.events.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [verify]
            timeout_ms = 250

            [events]
            batch_size = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.verify.timeout_ms, 250);
        assert_eq!(config.events.batch_size, 10);
        assert_eq!(config.server, ServerConfig::default());
        assert_eq!(config.rate_limit, RateLimitConfig::default());
    }

    #[test]
    fn env_overrides_toml() {
        let mut config = AppConfig::from_toml_str("[server]\nbind_addr = \"127.0.0.1:9000\"\n").unwrap();
        config
            .apply_env_overrides(&env(&[
                ("KEYGATE_BIND_ADDR", "127.0.0.1:9100"),
                ("KEYGATE_MAX_CAS_RETRIES", "7"),
                ("KEYGATE_EVENT_FLUSH_INTERVAL_MS", "250"),
            ]))
            .unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9100");
        assert_eq!(config.rate_limit.max_cas_retries, 7);
        assert_eq!(config.events.flush_interval_ms, 250);
    }

    #[test]
    fn bad_env_value_names_the_variable() {
        let mut config = AppConfig::default();
        let err = config.apply_env_overrides(&env(&[("KEYGATE_VERIFY_TIMEOUT_MS", "soon")])).unwrap_err();
        let ConfigError::InvalidValue { key, value, .. } = err;
        assert_eq!(key, "KEYGATE_VERIFY_TIMEOUT_MS");
        assert_eq!(value, "soon");
    }

    #[test]
    fn invalid_toml_is_reported() {
        assert!(AppConfig::from_toml_str("[verify\n").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[verify]\ndocs_base_url = \"https://docs.example.com/errors\"").unwrap();
        let config = AppConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.verify.docs_base_url, "https://docs.example.com/errors");
    }

    #[test]
    fn missing_file_is_reported() {
        let err = AppConfig::from_toml_file("/nonexistent/keygate.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }
}
