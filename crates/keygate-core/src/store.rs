//! Credential store gateway.
//!
//! The verifier never talks to persistence directly; everything goes through
//! [`CredentialStore`]. Lookups signal absence with `Ok(None)` so callers can
//! tell "not there" from "store unavailable".

use async_trait::async_trait;
use thiserror::Error;

use crate::hash::KeyHash;
use crate::types::ApiConfig;
use crate::types::Credential;
use crate::types::Workspace;

/// Errors from the credential store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// A write collided with an existing record.
    #[error("conflict: {reason}")]
    Conflict { reason: String },
}

/// Outcome of a conditional usage decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecrement {
    /// The credential has no usage limit; nothing was changed.
    Unlimited,
    /// `cost` was deducted.
    Applied {
        /// Balance before the decrement.
        remaining_before: u64,
        /// Balance after the decrement.
        remaining_after: u64,
    },
    /// The balance could not cover `cost`; nothing was changed.
    Insufficient {
        /// Balance at the time of the attempt.
        remaining: u64,
    },
}

/// Persistence contract required by the verifier.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a credential by the digest of its secret.
    async fn find_credential_by_hash(&self, hash: &KeyHash) -> Result<Option<Credential>, StoreError>;

    /// Look up an API's configuration.
    async fn find_api_config(&self, api_id: &str) -> Result<Option<ApiConfig>, StoreError>;

    /// Read a workspace's state.
    async fn read_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>, StoreError>;

    /// Atomically deduct `cost` from a credential's remaining uses, only if the
    /// balance covers it. Returns `None` when the credential does not exist.
    async fn decrement_remaining_uses(
        &self,
        credential_id: &str,
        cost: u64,
    ) -> Result<Option<QuotaDecrement>, StoreError>;

    /// Names of every permission granted to a credential. Grants and
    /// permissions outside the credential's workspace are ignored.
    async fn list_granted_permission_names(&self, credential_id: &str) -> Result<Vec<String>, StoreError>;
}

#[async_trait]
impl<T: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<T> {
    async fn find_credential_by_hash(&self, hash: &KeyHash) -> Result<Option<Credential>, StoreError> {
        (**self).find_credential_by_hash(hash).await
    }

    async fn find_api_config(&self, api_id: &str) -> Result<Option<ApiConfig>, StoreError> {
        (**self).find_api_config(api_id).await
    }

    async fn read_workspace(&self, workspace_id: &str) -> Result<Option<Workspace>, StoreError> {
        (**self).read_workspace(workspace_id).await
    }

    async fn decrement_remaining_uses(
        &self,
        credential_id: &str,
        cost: u64,
    ) -> Result<Option<QuotaDecrement>, StoreError> {
        (**self).decrement_remaining_uses(credential_id, cost).await
    }

    async fn list_granted_permission_names(&self, credential_id: &str) -> Result<Vec<String>, StoreError> {
        (**self).list_granted_permission_names(credential_id).await
    }
}

/// Pure conditional decrement used by store implementations.
///
/// Never produces a negative balance: a `cost` larger than the balance, or an
/// empty balance, leaves it untouched.
#[inline]
pub fn conditional_decrement(remaining: Option<u64>, cost: u64) -> QuotaDecrement {
    match remaining {
        None => QuotaDecrement::Unlimited,
        Some(remaining) if remaining == 0 || remaining < cost => QuotaDecrement::Insufficient { remaining },
        Some(remaining) => QuotaDecrement::Applied {
            remaining_before: remaining,
            remaining_after: remaining - cost,
        },
    }
}
