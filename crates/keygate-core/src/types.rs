//! Records the verifier reads from the credential store.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::hash::KeyHash;

/// Rate limit declared on a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Tokens available per window.
    pub limit: u64,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Optimistic out-of-band deduction instead of blocking the verdict.
    #[serde(default, rename = "async")]
    pub async_mode: bool,
}

/// A stored API key. The raw secret is never kept, only its digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: String,
    pub hash: KeyHash,
    /// Leading characters of the secret, for display only.
    #[serde(default)]
    pub display_prefix: String,
    pub workspace_id: String,
    /// The key space (credential set) the key was issued into.
    pub credential_set_id: String,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Caller-defined document, round-tripped untouched.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub created_at_ms: u64,
    #[serde(default)]
    pub expires_at_ms: Option<u64>,
    #[serde(default)]
    pub environment: Option<String>,
    /// Finite usage budget; `None` means unlimited.
    #[serde(default)]
    pub remaining_uses: Option<u64>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

fn default_enabled() -> bool {
    true
}

/// Tenant record. Disabling it disables every credential underneath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Configuration of a protected API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub id: String,
    pub workspace_id: String,
    pub credential_set_id: String,
    /// Permitted request origins. Absent or empty allows every origin.
    #[serde(default)]
    pub ip_allowlist: Option<BTreeSet<String>>,
}

impl ApiConfig {
    /// The allowlist, if one is configured and non-empty.
    pub fn active_allowlist(&self) -> Option<&BTreeSet<String>> {
        self.ip_allowlist.as_ref().filter(|list| !list.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
}

/// Join row between a credential and a permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub credential_id: String,
    pub permission_id: String,
    pub workspace_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_defaults_from_minimal_json() {
        let json = r#"{
            "id": "key_1",
            "hash": "abc=",
            "workspace_id": "ws_1",
            "credential_set_id": "ks_1",
            "created_at_ms": 10
        }"#;
        let credential: Credential = serde_json::from_str(json).unwrap();
        assert!(credential.enabled);
        assert_eq!(credential.remaining_uses, None);
        assert_eq!(credential.metadata, None);
        assert_eq!(credential.rate_limit, None);
    }

    #[test]
    fn rate_limit_async_field_name() {
        let config: RateLimitConfig = serde_json::from_str(r#"{"limit":10,"window_ms":60000,"async":true}"#).unwrap();
        assert!(config.async_mode);
        assert_eq!(config.limit, 10);
    }

    #[test]
    fn empty_allowlist_is_inactive() {
        let mut api = ApiConfig {
            id: "api_1".into(),
            workspace_id: "ws_1".into(),
            credential_set_id: "ks_1".into(),
            ip_allowlist: Some(BTreeSet::new()),
        };
        assert!(api.active_allowlist().is_none());

        api.ip_allowlist = Some(BTreeSet::from(["100.100.100.100".to_string()]));
        assert_eq!(api.active_allowlist().map(|l| l.len()), Some(1));
    }
}
