//! In-memory implementations of [`CredentialStore`] and [`KeyValueStore`].
//!
//! Used by tests and the development node. Every mutation runs inside a
//! single lock acquisition with no await point, so a dropped future can never
//! leave a decrement or swap half-applied.
//!
//! Both stores can be told to fail or to stall, which lets tests exercise the
//! verifier's timeout and outage paths without a real backend.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::hash::KeyHash;
use crate::kv::validate_write_command;
use crate::kv::KeyValueStore;
use crate::kv::KeyValueStoreError;
use crate::kv::ReadRequest;
use crate::kv::ReadResult;
use crate::kv::WriteCommand;
use crate::kv::WriteRequest;
use crate::kv::WriteResult;
use crate::store::conditional_decrement;
use crate::store::CredentialStore;
use crate::store::QuotaDecrement;
use crate::store::StoreError;
use crate::types::ApiConfig;
use crate::types::Credential;
use crate::types::Permission;
use crate::types::PermissionGrant;
use crate::types::Workspace;

/// Fault injection shared by both in-memory stores.
#[derive(Debug, Default)]
struct Faults {
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
}

impl Faults {
    async fn before_call(&self) -> Result<(), String> {
        let latency_ms = self.latency_ms.load(Ordering::SeqCst);
        if latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err("injected outage".to_string());
        }
        Ok(())
    }
}

/// Records loadable into [`DeterministicCredentialStore`] in one go.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreFixtures {
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
    #[serde(default)]
    pub apis: Vec<ApiConfig>,
    #[serde(default)]
    pub credentials: Vec<Credential>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub grants: Vec<PermissionGrant>,
}

#[derive(Debug, Default)]
struct CredentialTables {
    credentials: HashMap<String, Credential>,
    /// hash -> credential id
    by_hash: HashMap<KeyHash, String>,
    workspaces: HashMap<String, Workspace>,
    apis: HashMap<String, ApiConfig>,
    permissions: HashMap<String, Permission>,
    grants: Vec<PermissionGrant>,
}

/// In-memory [`CredentialStore`].
///
/// ```ignore
/// let store = DeterministicCredentialStore::new();
/// store.insert_workspace(Workspace { id: "ws_1".into(), enabled: true }).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeterministicCredentialStore {
    tables: Arc<Mutex<CredentialTables>>,
    faults: Arc<Faults>,
}

impl DeterministicCredentialStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every subsequent call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.faults.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn insert_workspace(&self, workspace: Workspace) {
        self.tables.lock().await.workspaces.insert(workspace.id.clone(), workspace);
    }

    /// Flip a workspace's kill switch. Returns false if the workspace is unknown.
    pub async fn set_workspace_enabled(&self, workspace_id: &str, enabled: bool) -> bool {
        match self.tables.lock().await.workspaces.get_mut(workspace_id) {
            Some(workspace) => {
                workspace.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub async fn insert_api(&self, api: ApiConfig) {
        self.tables.lock().await.apis.insert(api.id.clone(), api);
    }

    /// Insert a credential. Digests must be unique across the store.
    pub async fn insert_credential(&self, credential: Credential) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.by_hash.get(&credential.hash) {
            if existing != &credential.id {
                return Err(StoreError::Conflict {
                    reason: format!("hash already belongs to credential '{existing}'"),
                });
            }
        }
        tables.by_hash.insert(credential.hash.clone(), credential.id.clone());
        tables.credentials.insert(credential.id.clone(), credential);
        Ok(())
    }

    pub async fn insert_permission(&self, permission: Permission) {
        self.tables.lock().await.permissions.insert(permission.id.clone(), permission);
    }

    pub async fn grant_permission(&self, grant: PermissionGrant) {
        let mut tables = self.tables.lock().await;
        if !tables.grants.contains(&grant) {
            tables.grants.push(grant);
        }
    }

    /// Current usage balance of a credential, for assertions.
    pub async fn remaining_uses(&self, credential_id: &str) -> Option<u64> {
        self.tables.lock().await.credentials.get(credential_id).and_then(|c| c.remaining_uses)
    }

    pub async fn load_fixtures(&self, fixtures: StoreFixtures) -> Result<(), StoreError> {
        for workspace in fixtures.workspaces {
            self.insert_workspace(workspace).await;
        }
        for api in fixtures.apis {
            self.insert_api(api).await;
        }
        for credential in fixtures.credentials {
            self.insert_credential(credential).await?;
        }
        for permission in fixtures.permissions {
            self.insert_permission(permission).await;
        }
        for grant in fixtures.grants {
            self.grant_permission(grant).await;
        }
        Ok(())
    }

    async fn check_faults(&self) -> Result<(), StoreError> {
        self.faults.before_call().await.map_err(|reason| StoreError::Unavailable { reason })
    }
}

#[async_trait]
impl CredentialStore for DeterministicCredentialStore {
    async fn find_credential_by_hash(&self, hash: &KeyHash) -> Result<Option<Credential>, StoreError> {
        self.check_faults().await?;
        let tables = self.tables.lock().await;
        Ok(tables.by_hash.get(hash).and_then(|id| tables.credentials.get(id)).cloned())
    }

    async fn find_api_config(&self, api_id: &str) -> Result<Option<ApiConfig>, StoreError> {
        self.check_faults().await?;
        Ok(self.tables.lock().await.apis.get(api_id).cloned())
    }

    async fn read_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>, StoreError> {
        self.check_faults().await?;
        Ok(self.tables.lock().await.workspaces.get(workspace_id).cloned())
    }

    async fn decrement_remaining_uses(
        &self,
        credential_id: &str,
        cost: u64,
    ) -> Result<Option<QuotaDecrement>, StoreError> {
        self.check_faults().await?;
        let mut tables = self.tables.lock().await;
        let Some(credential) = tables.credentials.get_mut(credential_id) else {
            return Ok(None);
        };
        let outcome = conditional_decrement(credential.remaining_uses, cost);
        if let QuotaDecrement::Applied { remaining_after, .. } = outcome {
            credential.remaining_uses = Some(remaining_after);
        }
        debug!(credential_id, cost, ?outcome, "remaining uses decrement");
        Ok(Some(outcome))
    }

    async fn list_granted_permission_names(&self, credential_id: &str) -> Result<Vec<String>, StoreError> {
        self.check_faults().await?;
        let tables = self.tables.lock().await;
        let Some(workspace_id) = tables.credentials.get(credential_id).map(|c| c.workspace_id.as_str()) else {
            return Ok(Vec::new());
        };
        let names: BTreeSet<String> = tables
            .grants
            .iter()
            .filter(|grant| grant.credential_id == credential_id && grant.workspace_id == workspace_id)
            .filter_map(|grant| tables.permissions.get(&grant.permission_id))
            .filter(|permission| permission.workspace_id == workspace_id)
            .map(|permission| permission.name.clone())
            .collect();
        Ok(names.into_iter().collect())
    }
}

/// In-memory [`KeyValueStore`] with linearizable compare-and-swap.
#[derive(Debug, Clone, Default)]
pub struct DeterministicKeyValueStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
    faults: Arc<Faults>,
}

impl DeterministicKeyValueStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.faults.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of stored keys, for assertions.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    async fn check_faults(&self) -> Result<(), KeyValueStoreError> {
        self.faults.before_call().await.map_err(|reason| KeyValueStoreError::Failed { reason })
    }
}

#[async_trait]
impl KeyValueStore for DeterministicKeyValueStore {
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        validate_write_command(&request.command)?;
        self.check_faults().await?;

        let mut inner = self.inner.lock().await;
        match request.command {
            WriteCommand::Set { key, value } => {
                inner.insert(key, value);
                Ok(WriteResult::default())
            }
            WriteCommand::CompareAndSwap {
                key,
                expected,
                new_value,
            } => {
                let actual = inner.get(&key).cloned();
                if actual != expected {
                    return Err(KeyValueStoreError::CompareAndSwapFailed { key, expected, actual });
                }
                inner.insert(key, new_value);
                Ok(WriteResult::default())
            }
            WriteCommand::Delete { key } => {
                let existed = inner.remove(&key).is_some();
                Ok(WriteResult { deleted: Some(existed) })
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        self.check_faults().await?;
        let inner = self.inner.lock().await;
        match inner.get(&request.key) {
            Some(value) => Ok(ReadResult {
                key: request.key,
                value: value.clone(),
            }),
            None => Err(KeyValueStoreError::NotFound { key: request.key }),
        }
    }
}
