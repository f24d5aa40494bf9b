//! Request handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use keygate_verify::CallContext;
use keygate_verify::VerifyRequest;
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::AppState;

/// Header carrying the client address set by the edge proxy.
pub const TRUE_CLIENT_IP: &str = "true-client-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyKeyBody {
    key: String,
    api_id: String,
    #[serde(default)]
    ratelimit: Option<RatelimitBody>,
}

#[derive(Debug, Deserialize)]
struct RatelimitBody {
    cost: u64,
}

/// Parse and validate a `keys.verifyKey` body.
///
/// The error is a message suitable for a 400 response.
pub fn parse_verify_body(body: &[u8]) -> Result<VerifyRequest, String> {
    let body: VerifyKeyBody = serde_json::from_slice(body).map_err(|e| format!("invalid request body: {}", e))?;
    if body.key.is_empty() {
        return Err("key: must not be empty".to_string());
    }
    if body.api_id.is_empty() {
        return Err("apiId: must not be empty".to_string());
    }
    let cost = match body.ratelimit {
        Some(RatelimitBody { cost: 0 }) => return Err("ratelimit.cost: must be at least 1".to_string()),
        Some(RatelimitBody { cost }) => Some(cost),
        None => None,
    };
    Ok(VerifyRequest {
        key: body.key,
        api_id: body.api_id,
        cost,
    })
}

/// Client address: `True-Client-IP`, else the first `X-Forwarded-For` hop.
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);
    if let Some(ip) = header(TRUE_CLIENT_IP).filter(|ip| !ip.is_empty()) {
        return Some(ip.to_string());
    }
    header(X_FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// `POST /v1/keys.verifyKey`
pub async fn verify_key(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = match parse_verify_body(&body) {
        Ok(request) => request,
        Err(message) => {
            tracing::debug!(%message, "rejected verify request");
            return ApiError::bad_request(message, &state.docs_base_url).into_response();
        }
    };

    let origin = request_origin(&headers);
    let ctx = CallContext::with_timeout(state.verify_timeout);
    match state.verifier.verify(&request, origin.as_deref(), &ctx).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => ApiError::from_verify(&e, &state.docs_base_url).into_response(),
    }
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
