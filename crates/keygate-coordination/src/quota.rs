//! Usage quota accounting.
//!
//! The conditional decrement itself happens inside the credential store as a
//! single atomic operation; this layer only interprets its outcome.

use std::sync::Arc;

use keygate_core::CredentialStore;
use keygate_core::QuotaDecrement;
use tracing::debug;

use crate::error::CoordinationError;
use crate::types::QuotaOutcome;

/// Charges requests against a credential's finite usage budget.
pub struct QuotaAccountant<S: CredentialStore + ?Sized> {
    store: Arc<S>,
}

impl<S: CredentialStore + ?Sized> QuotaAccountant<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Deduct `cost` uses. Never drives the balance below zero; when the
    /// balance cannot cover `cost` nothing is charged and `ok` is false.
    pub async fn try_decrement(&self, credential_id: &str, cost: u64) -> Result<QuotaOutcome, CoordinationError> {
        let decrement = self.store.decrement_remaining_uses(credential_id, cost).await?.ok_or_else(|| {
            CoordinationError::UnknownCredential {
                credential_id: credential_id.to_string(),
            }
        })?;

        let outcome = match decrement {
            QuotaDecrement::Unlimited => QuotaOutcome {
                ok: true,
                remaining_before: None,
                remaining_after: None,
            },
            QuotaDecrement::Applied {
                remaining_before,
                remaining_after,
            } => QuotaOutcome {
                ok: true,
                remaining_before: Some(remaining_before),
                remaining_after: Some(remaining_after),
            },
            QuotaDecrement::Insufficient { remaining } => QuotaOutcome {
                ok: false,
                remaining_before: Some(remaining),
                remaining_after: Some(remaining),
            },
        };
        debug!(credential_id, cost, ok = outcome.ok, remaining = ?outcome.remaining_after, "usage quota checked");
        Ok(outcome)
    }
}
