//! Error bodies returned by the HTTP API.
//!
//! Every hard failure answers with `{ "error": { code, message, docs } }`.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use keygate_verify::VerifyError;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub docs: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: &'a str,
    docs: &'a str,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: String, docs_base_url: &str) -> Self {
        Self {
            status,
            code,
            message,
            docs: format!("{}/{}", docs_base_url.trim_end_matches('/'), code),
        }
    }

    /// Request body failed schema validation.
    pub fn bad_request(message: impl Into<String>, docs_base_url: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message.into(), docs_base_url)
    }

    pub fn from_verify(err: &VerifyError, docs_base_url: &str) -> Self {
        let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, err.code(), err.public_message(), docs_base_url)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: &self.message,
                docs: &self.docs,
            },
        };
        (self.status, Json(body)).into_response()
    }
}
