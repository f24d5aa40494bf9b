//! Hard verification failures.
//!
//! These abort the pipeline and surface as an error body at the transport
//! boundary. Soft outcomes (disabled, expired, ...) are never errors; see
//! [`VerifyCode`](crate::VerifyCode).

use keygate_core::HashError;
use snafu::Snafu;

/// Errors that abort verification.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum VerifyError {
    /// The raw secret could not be hashed.
    #[snafu(display("invalid key: {source}"))]
    InvalidKey {
        /// The hashing failure.
        source: HashError,
    },

    /// No credential or API matched.
    #[snafu(display("{resource} not found"))]
    NotFound {
        /// What was missing: `key` or `api`.
        resource: &'static str,
    },

    /// The credential exists but belongs to a different API.
    #[snafu(display("key '{key_id}' does not belong to api '{api_id}'"))]
    TenantMismatch {
        /// Credential that was presented.
        key_id: String,
        /// API it was presented to.
        api_id: String,
    },

    /// The owning workspace is disabled or missing.
    #[snafu(display("workspace '{workspace_id}' is disabled"))]
    WorkspaceDisabled {
        /// The workspace.
        workspace_id: String,
    },

    /// The call deadline passed.
    #[snafu(display("deadline exceeded during {operation}"))]
    Timeout {
        /// Step that was running.
        operation: &'static str,
    },

    /// The caller cancelled the call.
    #[snafu(display("request cancelled during {operation}"))]
    Cancelled {
        /// Step that was running.
        operation: &'static str,
    },

    /// A store or limiter failed.
    #[snafu(display("{operation} failed: {reason}"))]
    Internal {
        /// Step that was running.
        operation: &'static str,
        /// Underlying failure.
        reason: String,
    },
}

impl VerifyError {
    pub fn internal(operation: &'static str, err: impl std::fmt::Display) -> Self {
        VerifyError::Internal {
            operation,
            reason: err.to_string(),
        }
    }

    /// Machine-readable error code returned to callers.
    pub fn code(&self) -> &'static str {
        match self {
            VerifyError::InvalidKey { .. } => "BAD_REQUEST",
            VerifyError::NotFound { .. } | VerifyError::TenantMismatch { .. } => "NOT_FOUND",
            VerifyError::WorkspaceDisabled { .. } => "FORBIDDEN",
            VerifyError::Timeout { .. } => "TIMEOUT",
            VerifyError::Cancelled { .. } => "UNAVAILABLE",
            VerifyError::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    /// HTTP status the transport should answer with.
    pub fn status(&self) -> u16 {
        match self {
            VerifyError::InvalidKey { .. } => 400,
            VerifyError::NotFound { .. } | VerifyError::TenantMismatch { .. } => 404,
            VerifyError::WorkspaceDisabled { .. } => 403,
            VerifyError::Timeout { .. } => 504,
            VerifyError::Cancelled { .. } => 503,
            VerifyError::Internal { .. } => 500,
        }
    }

    /// Message safe to show callers.
    ///
    /// A key presented to the wrong API, an unknown API and an unknown key all
    /// read the same, so API ids cannot be discovered across tenants.
    pub fn public_message(&self) -> String {
        match self {
            VerifyError::NotFound { .. } | VerifyError::TenantMismatch { .. } => "key not found".to_string(),
            VerifyError::WorkspaceDisabled { .. } => "workspace is disabled".to_string(),
            VerifyError::Timeout { operation } => operation.to_string(),
            VerifyError::Cancelled { .. } => "request cancelled".to_string(),
            other => other.to_string(),
        }
    }
}
