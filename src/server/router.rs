//! Axum router configuration
//!
//! ```text
//! /
//! ├── POST /v1/keys.verifyKey  - Verify an API key
//! └── GET  /health             - Liveness probe
//! ```

use axum::routing::get;
use axum::routing::post;
use axum::Router;

use super::handlers::health;
use super::handlers::verify_key;
use super::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/keys.verifyKey", post(verify_key))
        .route("/health", get(health))
        .with_state(state)
}
