//! HTTP transport for the verifier.

pub mod error;
pub mod handlers;
mod router;

use std::sync::Arc;
use std::time::Duration;

use keygate_core::CredentialStore;
use keygate_core::KeyValueStore;
use keygate_time::Clock;
use keygate_verify::VerificationEventSink;
use keygate_verify::Verifier;
use keygate_verify::VerifierConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::ApiError;
pub use router::build_router;

use crate::config::AppConfig;
use crate::config::VerifyConfig;

/// Verifier with its stores and clock behind trait objects.
pub type NodeVerifier = Verifier<dyn CredentialStore, dyn KeyValueStore, dyn Clock>;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub(crate) verifier: Arc<NodeVerifier>,
    pub(crate) verify_timeout: Duration,
    pub(crate) docs_base_url: Arc<str>,
}

impl AppState {
    pub fn new(verifier: Arc<NodeVerifier>, config: &VerifyConfig) -> Self {
        Self {
            verifier,
            verify_timeout: config.timeout(),
            docs_base_url: Arc::from(config.docs_base_url.as_str()),
        }
    }
}

/// Wire a verifier from configuration and its collaborators.
pub fn build_verifier(
    config: &AppConfig,
    store: Arc<dyn CredentialStore>,
    windows: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    events: Option<Arc<dyn VerificationEventSink>>,
) -> Arc<NodeVerifier> {
    let verifier_config = VerifierConfig {
        rate_limiter: config.rate_limit.limiter_config(),
    };
    let verifier = Verifier::new(store, windows, clock, verifier_config);
    let verifier = match events {
        Some(sink) => verifier.with_event_sink(sink),
        None => verifier,
    };
    Arc::new(verifier)
}

/// Serve `state` on `listener` until `cancel` fires.
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) -> std::io::Result<()> {
    axum::serve(listener, build_router(state)).with_graceful_shutdown(cancel.cancelled_owned()).await
}
