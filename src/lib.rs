//! keygate: API key verification service.
//!
//! The verification engine lives in the `keygate-*` crates; this crate adds
//! layered configuration and the HTTP transport used by `keygate-node`.

pub mod config;
pub mod server;

pub use config::AppConfig;
pub use config::ConfigError;
pub use server::build_router;
pub use server::build_verifier;
pub use server::AppState;
pub use server::NodeVerifier;
