//! The verification pipeline.
//!
//! Order of evaluation:
//!
//! 1. hash the secret and look up the credential
//! 2. load the API and check the credential belongs to it
//! 3. load the workspace and check it is enabled
//! 4. enabled, expiry and origin checks (pure, see [`crate::decision`])
//! 5. rate limit, while the verdict is still open
//! 6. usage quota, while the verdict is still open
//! 7. permissions, always
//!
//! Steps 1 to 3 fail hard. Everything after yields a soft verdict that still
//! carries the credential's identity fields.

use std::collections::BTreeSet;
use std::sync::Arc;

use keygate_coordination::QuotaAccountant;
use keygate_coordination::WindowRateLimiter;
use keygate_coordination::WindowRateLimiterConfig;
use keygate_coordination::WindowRequest;
use keygate_core::digest;
use keygate_core::Credential;
use keygate_core::CredentialStore;
use keygate_core::KeyValueStore;
use keygate_core::DEFAULT_REQUEST_COST;
use keygate_time::Clock;
use tracing::debug;
use tracing::warn;

use crate::context::CallContext;
use crate::decision::check_tenant;
use crate::decision::check_workspace;
use crate::decision::evaluate_credential;
use crate::decision::CredentialSnapshot;
use crate::decision::HardFailure;
use crate::decision::Step;
use crate::error::VerifyError;
use crate::events::NoopEventSink;
use crate::events::VerificationEvent;
use crate::events::VerificationEventSink;
use crate::permissions::PermissionResolver;
use crate::result::RateLimitState;
use crate::result::VerifyCode;
use crate::result::VerifyResult;

/// A key presented for verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    /// Raw secret.
    pub key: String,
    pub api_id: String,
    /// Rate limit tokens to charge; defaults to 1.
    pub cost: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct VerifierConfig {
    pub rate_limiter: WindowRateLimiterConfig,
}

/// Verifies API keys against a credential store.
pub struct Verifier<S, K, C>
where
    S: CredentialStore + ?Sized,
    K: KeyValueStore + ?Sized,
    C: Clock + ?Sized,
{
    store: Arc<S>,
    clock: Arc<C>,
    rate_limiter: WindowRateLimiter<K, C>,
    quota: QuotaAccountant<S>,
    permissions: PermissionResolver<S>,
    events: Arc<dyn VerificationEventSink>,
}

impl<S, K, C> Verifier<S, K, C>
where
    S: CredentialStore + ?Sized,
    K: KeyValueStore + ?Sized + 'static,
    C: Clock + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, windows: Arc<K>, clock: Arc<C>, config: VerifierConfig) -> Self {
        Self {
            rate_limiter: WindowRateLimiter::new(windows, Arc::clone(&clock), config.rate_limiter),
            quota: QuotaAccountant::new(Arc::clone(&store)),
            permissions: PermissionResolver::new(Arc::clone(&store)),
            store,
            clock,
            events: Arc::new(NoopEventSink),
        }
    }

    /// Send one event per evaluated request to `sink`.
    pub fn with_event_sink(mut self, sink: Arc<dyn VerificationEventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Verify one key.
    ///
    /// `origin` is the caller's network address as seen by the transport.
    pub async fn verify(
        &self,
        request: &VerifyRequest,
        origin: Option<&str>,
        ctx: &CallContext,
    ) -> Result<VerifyResult, VerifyError> {
        match self.evaluate(request, origin, ctx).await {
            Ok((result, workspace_id)) => {
                debug!(
                    api_id = %request.api_id,
                    key_id = ?result.key_id,
                    code = %result.code,
                    "key verified"
                );
                if let Some(key_id) = result.key_id.clone() {
                    self.events.emit(VerificationEvent {
                        workspace_id,
                        api_id: request.api_id.clone(),
                        key_id,
                        code: result.code,
                        time_ms: self.clock.now_ms(),
                    });
                }
                Ok(result)
            }
            Err(e) => {
                warn!(api_id = %request.api_id, code = e.code(), error = %e, "key verification failed");
                Err(e)
            }
        }
    }

    async fn evaluate(
        &self,
        request: &VerifyRequest,
        origin: Option<&str>,
        ctx: &CallContext,
    ) -> Result<(VerifyResult, String), VerifyError> {
        let hash = digest(&request.key).map_err(|source| VerifyError::InvalidKey { source })?;

        let credential = ctx
            .run("find_credential", self.store.find_credential_by_hash(&hash))
            .await?
            .map_err(|e| VerifyError::internal("find_credential", e))?
            .ok_or(VerifyError::NotFound { resource: "key" })?;

        let api = ctx
            .run("find_api", self.store.find_api_config(&request.api_id))
            .await?
            .map_err(|e| VerifyError::internal("find_api", e))?
            .ok_or(VerifyError::NotFound { resource: "api" })?;

        if let Step::Hard(failure) = check_tenant(&credential, &api) {
            return Err(hard_error(failure, &credential, &request.api_id));
        }

        let workspace = ctx
            .run("read_workspace", self.store.read_workspace(&credential.workspace_id))
            .await?
            .map_err(|e| VerifyError::internal("read_workspace", e))?;
        if let Step::Hard(failure) = check_workspace(workspace.as_ref()) {
            return Err(hard_error(failure, &credential, &request.api_id));
        }

        let snapshot = CredentialSnapshot {
            credential: &credential,
            api: &api,
            origin,
            now_ms: self.clock.now_ms(),
        };
        let mut verdict = match evaluate_credential(&snapshot) {
            Step::Continue => None,
            Step::Soft(code) => Some(code),
            Step::Hard(failure) => return Err(hard_error(failure, &credential, &request.api_id)),
        };

        let cost = request.cost.unwrap_or(DEFAULT_REQUEST_COST);

        let mut rate_limit = None;
        if let (None, Some(config)) = (verdict, credential.rate_limit) {
            let outcome = ctx
                .run(
                    "rate_limit",
                    self.rate_limiter.consume(WindowRequest {
                        credential_id: &credential.id,
                        cost,
                        limit: config.limit,
                        window_ms: config.window_ms,
                        async_mode: config.async_mode,
                    }),
                )
                .await?
                .map_err(|e| VerifyError::internal("rate_limit", e))?;
            rate_limit = Some(RateLimitState {
                limit: outcome.limit,
                remaining: outcome.remaining,
                reset_at_ms: outcome.reset_at_ms,
            });
            if !outcome.allowed {
                verdict = Some(VerifyCode::RateLimited);
            }
        }

        if verdict.is_none() && credential.remaining_uses.is_some() {
            let outcome = ctx
                .run("quota", self.quota.try_decrement(&credential.id, cost))
                .await?
                .map_err(|e| VerifyError::internal("quota", e))?;
            if !outcome.ok {
                verdict = Some(VerifyCode::UsageExceeded);
            }
        }

        let permissions = ctx
            .run("permissions", self.permissions.list_permissions(&credential.id))
            .await?
            .map_err(|e| VerifyError::internal("permissions", e))?;

        let code = verdict.unwrap_or(VerifyCode::Valid);
        let workspace_id = credential.workspace_id.clone();
        Ok((build_result(credential, code, permissions, rate_limit), workspace_id))
    }
}

fn hard_error(failure: HardFailure, credential: &Credential, api_id: &str) -> VerifyError {
    match failure {
        HardFailure::TenantMismatch => VerifyError::TenantMismatch {
            key_id: credential.id.clone(),
            api_id: api_id.to_string(),
        },
        HardFailure::WorkspaceDisabled => VerifyError::WorkspaceDisabled {
            workspace_id: credential.workspace_id.clone(),
        },
    }
}

fn build_result(
    credential: Credential,
    code: VerifyCode,
    permissions: BTreeSet<String>,
    rate_limit: Option<RateLimitState>,
) -> VerifyResult {
    VerifyResult {
        key_id: Some(credential.id),
        valid: code == VerifyCode::Valid,
        code,
        metadata: credential.metadata,
        expires_at_ms: credential.expires_at_ms,
        environment: credential.environment,
        name: credential.name,
        owner_id: credential.owner_id,
        permissions,
        rate_limit,
    }
}
