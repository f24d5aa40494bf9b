//! Flattens a credential's grants into an ordered set of permission names.

use std::collections::BTreeSet;
use std::sync::Arc;

use keygate_core::CredentialStore;
use keygate_core::StoreError;

pub struct PermissionResolver<S: CredentialStore + ?Sized> {
    store: Arc<S>,
}

impl<S: CredentialStore + ?Sized> PermissionResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Empty when the credential has no grants.
    pub async fn list_permissions(&self, credential_id: &str) -> Result<BTreeSet<String>, StoreError> {
        let names = self.store.list_granted_permission_names(credential_id).await?;
        Ok(names.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use keygate_core::digest;
    use keygate_core::Credential;
    use keygate_core::DeterministicCredentialStore;
    use keygate_core::Permission;
    use keygate_core::PermissionGrant;

    use super::*;

    #[tokio::test]
    async fn resolves_granted_names() {
        let store = DeterministicCredentialStore::new();
        store
            .insert_credential(Credential {
                id: "key_1".into(),
                hash: digest("sk_resolver").unwrap(),
                display_prefix: "sk_resol".into(),
                workspace_id: "ws_1".into(),
                credential_set_id: "ks_1".into(),
                owner_id: None,
                name: None,
                metadata: None,
                enabled: true,
                created_at_ms: 0,
                expires_at_ms: None,
                environment: None,
                remaining_uses: None,
                rate_limit: None,
            })
            .await
            .unwrap();
        store
            .insert_permission(Permission {
                id: "perm_1".into(),
                workspace_id: "ws_1".into(),
                name: "domains.create".into(),
            })
            .await;
        store
            .grant_permission(PermissionGrant {
                credential_id: "key_1".into(),
                permission_id: "perm_1".into(),
                workspace_id: "ws_1".into(),
            })
            .await;

        let resolver = PermissionResolver::new(store);
        assert_eq!(
            resolver.list_permissions("key_1").await.unwrap(),
            BTreeSet::from(["domains.create".to_string()])
        );
        assert!(resolver.list_permissions("key_2").await.unwrap().is_empty());
    }
}
