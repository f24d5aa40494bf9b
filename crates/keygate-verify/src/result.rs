//! Verdict returned by the pipeline.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Outcome code of a completed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifyCode {
    Valid,
    Disabled,
    Expired,
    Forbidden,
    UsageExceeded,
    RateLimited,
}

impl VerifyCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyCode::Valid => "VALID",
            VerifyCode::Disabled => "DISABLED",
            VerifyCode::Expired => "EXPIRED",
            VerifyCode::Forbidden => "FORBIDDEN",
            VerifyCode::UsageExceeded => "USAGE_EXCEEDED",
            VerifyCode::RateLimited => "RATE_LIMITED",
        }
    }
}

impl fmt::Display for VerifyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate limit state attached whenever the limiter was consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub limit: u64,
    pub remaining: u64,
    /// Window close time (Unix milliseconds).
    #[serde(rename = "reset")]
    pub reset_at_ms: u64,
}

/// Result of verifying one key.
///
/// Identity fields are filled for every soft verdict so callers can tell
/// which key was refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    pub valid: bool,
    pub code: VerifyCode,
    #[serde(default, rename = "meta", skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, rename = "expires", skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default, rename = "ratelimit", skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitState>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn code_wire_names() {
        assert_eq!(serde_json::to_value(VerifyCode::UsageExceeded).unwrap(), json!("USAGE_EXCEEDED"));
        assert_eq!(serde_json::to_value(VerifyCode::RateLimited).unwrap(), json!("RATE_LIMITED"));
        assert_eq!(VerifyCode::Valid.to_string(), "VALID");
    }

    #[test]
    fn result_wire_shape() {
        let result = VerifyResult {
            key_id: Some("key_1".into()),
            valid: false,
            code: VerifyCode::RateLimited,
            metadata: Some(json!({"plan": "pro"})),
            expires_at_ms: None,
            environment: None,
            name: Some("ci".into()),
            owner_id: Some("user_1".into()),
            permissions: BTreeSet::from(["read".to_string()]),
            rate_limit: Some(RateLimitState {
                limit: 10,
                remaining: 2,
                reset_at_ms: 60_000,
            }),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "keyId": "key_1",
                "valid": false,
                "code": "RATE_LIMITED",
                "meta": {"plan": "pro"},
                "name": "ci",
                "ownerId": "user_1",
                "permissions": ["read"],
                "ratelimit": {"limit": 10, "remaining": 2, "reset": 60000}
            })
        );
    }
}
