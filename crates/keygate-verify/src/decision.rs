//! Pure verification checks.
//!
//! Each check looks at an immutable snapshot and answers with a [`Step`]:
//! keep going, stop with a hard failure, or record a soft verdict. The
//! pipeline runs them in a fixed order and stops at the first non-`Continue`.
//!
//! # Tiger Style
//!
//! - Time is passed in the snapshot, never read here
//! - No I/O, no panics

use keygate_core::ApiConfig;
use keygate_core::Credential;
use keygate_core::Workspace;

use crate::result::VerifyCode;

/// Hard failures decided from loaded records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardFailure {
    /// Credential set or workspace of the key does not match the API.
    TenantMismatch,
    /// Workspace disabled or missing.
    WorkspaceDisabled,
}

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Hard(HardFailure),
    Soft(VerifyCode),
}

/// Everything the credential-level checks need.
#[derive(Debug, Clone, Copy)]
pub struct CredentialSnapshot<'a> {
    pub credential: &'a Credential,
    pub api: &'a ApiConfig,
    /// Request origin, if the transport supplied one.
    pub origin: Option<&'a str>,
    pub now_ms: u64,
}

/// The key must have been issued into the API's credential set.
#[inline]
pub fn check_tenant(credential: &Credential, api: &ApiConfig) -> Step {
    if credential.credential_set_id != api.credential_set_id || credential.workspace_id != api.workspace_id {
        Step::Hard(HardFailure::TenantMismatch)
    } else {
        Step::Continue
    }
}

/// A missing workspace is treated as disabled.
#[inline]
pub fn check_workspace(workspace: Option<&Workspace>) -> Step {
    match workspace {
        Some(workspace) if workspace.enabled => Step::Continue,
        _ => Step::Hard(HardFailure::WorkspaceDisabled),
    }
}

#[inline]
pub fn check_enabled(credential: &Credential) -> Step {
    if credential.enabled {
        Step::Continue
    } else {
        Step::Soft(VerifyCode::Disabled)
    }
}

/// Expired from `expires_at_ms` on, inclusive.
#[inline]
pub fn check_expiry(credential: &Credential, now_ms: u64) -> Step {
    match credential.expires_at_ms {
        Some(expires_at_ms) if now_ms >= expires_at_ms => Step::Soft(VerifyCode::Expired),
        _ => Step::Continue,
    }
}

/// With an active allowlist the origin must be present and listed.
#[inline]
pub fn check_origin(api: &ApiConfig, origin: Option<&str>) -> Step {
    let Some(allowlist) = api.active_allowlist() else {
        return Step::Continue;
    };
    match origin {
        Some(origin) if allowlist.contains(origin.trim()) => Step::Continue,
        _ => Step::Soft(VerifyCode::Forbidden),
    }
}

/// Run the credential-level checks in order: enabled, expiry, origin.
pub fn evaluate_credential(snapshot: &CredentialSnapshot<'_>) -> Step {
    let checks = [
        check_enabled(snapshot.credential),
        check_expiry(snapshot.credential, snapshot.now_ms),
        check_origin(snapshot.api, snapshot.origin),
    ];
    checks.into_iter().find(|step| *step != Step::Continue).unwrap_or(Step::Continue)
}
