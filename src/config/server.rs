//! HTTP listener configuration

use std::net::SocketAddr;

use serde::Deserialize;
use serde::Serialize;

use super::error::ConfigError;
use super::EnvLookup;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    pub bind_addr: String,
}

impl ServerConfig {
    pub fn apply_env_overrides(&mut self, env: EnvLookup<'_>) -> Result<(), ConfigError> {
        if let Some(val) = env("KEYGATE_BIND_ADDR") {
            self.bind_addr = val;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr
            .parse()
            .map_err(|e| ConfigError::invalid("server.bind_addr", &self.bind_addr, format!("not a socket address: {}", e)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unparseable_address() {
        let config = ServerConfig {
            bind_addr: "localhost".into(),
        };
        assert!(config.validate().is_err());
    }
}
