//! Test support for keygate integration tests.
//!
//! [`Harness`] wires a verifier over the deterministic stores, a simulated
//! clock and a recording event sink, seeded with one workspace (`ws_1`) and
//! one API (`api_1`) issuing into credential set `ks_1`.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use axum::Router;
use http_body_util::BodyExt;
use keygate::config::VerifyConfig;
use keygate::AppConfig;
use keygate::AppState;
use keygate::NodeVerifier;
use keygate_core::digest;
use keygate_core::display_prefix;
use keygate_core::ApiConfig;
use keygate_core::Credential;
use keygate_core::DeterministicCredentialStore;
use keygate_core::DeterministicKeyValueStore;
use keygate_core::Permission;
use keygate_core::PermissionGrant;
use keygate_core::Workspace;
use keygate_time::SimulatedClock;
use keygate_verify::VerificationEvent;
use keygate_verify::VerificationEventSink;
use serde_json::Value;
use tower::ServiceExt;

/// Fixed start time for the simulated clock.
pub const NOW_MS: u64 = 1_700_000_000_000;

pub const WORKSPACE_ID: &str = "ws_1";
pub const API_ID: &str = "api_1";
pub const CREDENTIAL_SET_ID: &str = "ks_1";

/// Event sink that keeps everything it is given.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<VerificationEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<VerificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl VerificationEventSink for RecordingSink {
    fn emit(&self, event: VerificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub store: Arc<DeterministicCredentialStore>,
    pub windows: Arc<DeterministicKeyValueStore>,
    pub clock: Arc<SimulatedClock>,
    pub events: Arc<RecordingSink>,
    pub verifier: Arc<NodeVerifier>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let store = DeterministicCredentialStore::new();
        store
            .insert_workspace(Workspace {
                id: WORKSPACE_ID.into(),
                enabled: true,
            })
            .await;
        store.insert_api(api(API_ID, None)).await;

        let windows = DeterministicKeyValueStore::new();
        let clock = Arc::new(SimulatedClock::new(NOW_MS));
        let events = Arc::new(RecordingSink::default());
        let verifier =
            keygate::build_verifier(&config, store.clone(), windows.clone(), clock.clone(), Some(events.clone()));

        Self {
            store,
            windows,
            clock,
            events,
            verifier,
        }
    }

    /// Insert a credential, panicking on a digest conflict.
    pub async fn add(&self, credential: Credential) {
        self.store.insert_credential(credential).await.unwrap();
    }

    /// Create permission `name` in `ws_1` and grant it to `credential_id`.
    pub async fn grant(&self, credential_id: &str, name: &str) {
        let permission_id = format!("perm_{name}");
        self.store
            .insert_permission(Permission {
                id: permission_id.clone(),
                workspace_id: WORKSPACE_ID.into(),
                name: name.into(),
            })
            .await;
        self.store
            .grant_permission(PermissionGrant {
                credential_id: credential_id.into(),
                permission_id,
                workspace_id: WORKSPACE_ID.into(),
            })
            .await;
    }

    pub fn router(&self) -> Router {
        keygate::build_router(AppState::new(self.verifier.clone(), &VerifyConfig::default()))
    }
}

/// An enabled, unrestricted credential for `secret` in `ws_1`/`ks_1`.
pub fn credential(id: &str, secret: &str) -> Credential {
    Credential {
        id: id.into(),
        hash: digest(secret).unwrap(),
        display_prefix: display_prefix(secret),
        workspace_id: WORKSPACE_ID.into(),
        credential_set_id: CREDENTIAL_SET_ID.into(),
        owner_id: None,
        name: None,
        metadata: None,
        enabled: true,
        created_at_ms: NOW_MS - 86_400_000,
        expires_at_ms: None,
        environment: None,
        remaining_uses: None,
        rate_limit: None,
    }
}

pub fn api(id: &str, allowlist: Option<&[&str]>) -> ApiConfig {
    ApiConfig {
        id: id.into(),
        workspace_id: WORKSPACE_ID.into(),
        credential_set_id: CREDENTIAL_SET_ID.into(),
        ip_allowlist: allowlist.map(|ips| ips.iter().map(|ip| ip.to_string()).collect::<BTreeSet<_>>()),
    }
}

/// POST a JSON body to `/v1/keys.verifyKey` and decode the JSON response.
pub async fn post_verify(router: Router, body: Value, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    post_raw(router, body.to_string(), headers).await
}

pub async fn post_raw(router: Router, body: String, headers: &[(&str, &str)]) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/keys.verifyKey")
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = router.oneshot(builder.body(Body::from(body)).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
