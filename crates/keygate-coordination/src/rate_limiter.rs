//! Shared fixed-window rate limiter.
//!
//! Window state lives in a [`KeyValueStore`] so every verifier instance draws
//! from the same budget. Deductions are compare-and-swap loops with
//! exponential backoff.
//!
//! In async mode the verdict is taken from a process-local estimate and the
//! authoritative deduction runs in a spawned task. Concurrent async callers
//! can overshoot the limit by the number of requests in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use keygate_core::KeyValueStore;
use keygate_core::KeyValueStoreError;
use keygate_core::ReadRequest;
use keygate_core::WriteRequest;
use keygate_core::CAS_RETRY_INITIAL_BACKOFF_MS;
use keygate_core::CAS_RETRY_MAX_BACKOFF_MS;
use keygate_core::MAX_CAS_RETRIES;
use keygate_core::MAX_TRACKED_WINDOWS;
use keygate_core::MIN_RATE_LIMIT_WINDOW_MS;
use keygate_time::Clock;
use parking_lot::Mutex;
use tracing::debug;
use tracing::warn;

use crate::error::CoordinationError;
use crate::error::RateLimitError;
use crate::pure::check_window_deduction;
use crate::pure::compute_backoff_with_jitter;
use crate::pure::fresh_window;
use crate::pure::window_epoch;
use crate::pure::window_key;
use crate::pure::window_reset_at;
use crate::pure::WindowDeduction;
use crate::types::RateLimitOutcome;
use crate::types::WindowState;

/// Configuration for [`WindowRateLimiter`].
#[derive(Debug, Clone)]
pub struct WindowRateLimiterConfig {
    /// CAS attempts before a contended window reports the request as limited.
    pub max_cas_retries: u32,
    /// Smallest accepted window length.
    pub min_window_ms: u64,
}

impl Default for WindowRateLimiterConfig {
    fn default() -> Self {
        Self {
            max_cas_retries: MAX_CAS_RETRIES,
            min_window_ms: MIN_RATE_LIMIT_WINDOW_MS,
        }
    }
}

/// One rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRequest<'a> {
    pub credential_id: &'a str,
    /// Tokens to draw.
    pub cost: u64,
    /// Tokens per window.
    pub limit: u64,
    pub window_ms: u64,
    /// Decide from the local estimate and deduct in the background.
    pub async_mode: bool,
}

/// Where a window lives: its storage key, epoch and close time.
#[derive(Debug, Clone)]
struct WindowSlot {
    key: String,
    epoch: u64,
    reset_at_ms: u64,
}

/// Fixed-window rate limiter over a shared key-value store.
pub struct WindowRateLimiter<S: KeyValueStore + ?Sized, C: Clock + ?Sized> {
    store: Arc<S>,
    clock: Arc<C>,
    config: WindowRateLimiterConfig,
    /// Last observed state per window key.
    estimates: Arc<Mutex<HashMap<String, WindowState>>>,
}

impl<S: KeyValueStore + ?Sized, C: Clock + ?Sized> Clone for WindowRateLimiter<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            estimates: Arc::clone(&self.estimates),
        }
    }
}

impl<S, C> WindowRateLimiter<S, C>
where
    S: KeyValueStore + ?Sized + 'static,
    C: Clock + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<C>, config: WindowRateLimiterConfig) -> Self {
        Self {
            store,
            clock,
            config,
            estimates: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Draw `request.cost` tokens from the credential's current window.
    ///
    /// Running out of tokens is `Ok` with `allowed == false`. An error means
    /// no decision could be reached.
    pub async fn consume(&self, request: WindowRequest<'_>) -> Result<RateLimitOutcome, RateLimitError> {
        if request.window_ms < self.config.min_window_ms {
            return Err(RateLimitError::InvalidWindow {
                window_ms: request.window_ms,
                min_window_ms: self.config.min_window_ms,
            });
        }

        let now_ms = self.clock.now_ms();
        let epoch = window_epoch(now_ms, request.window_ms);
        let slot = WindowSlot {
            key: window_key(request.credential_id, epoch),
            epoch,
            reset_at_ms: window_reset_at(epoch, request.window_ms),
        };

        if request.async_mode {
            Ok(self.consume_optimistic(request, slot))
        } else {
            self.consume_authoritative(request.credential_id, request.cost, request.limit, &slot)
                .await
                .map_err(RateLimitError::from)
        }
    }

    /// Read a credential's current window without drawing from it.
    pub async fn peek(&self, credential_id: &str, limit: u64, window_ms: u64) -> Result<WindowState, CoordinationError> {
        let epoch = window_epoch(self.clock.now_ms(), window_ms);
        let key = window_key(credential_id, epoch);
        match self.read_window(&key).await? {
            Some((state, _)) => Ok(state),
            None => Ok(fresh_window(limit, window_reset_at(epoch, window_ms))),
        }
    }

    fn consume_optimistic(&self, request: WindowRequest<'_>, slot: WindowSlot) -> RateLimitOutcome {
        let estimate = self.estimates.lock().get(&slot.key).copied();
        let state = estimate.unwrap_or_else(|| fresh_window(request.limit, slot.reset_at_ms));
        let deduction = check_window_deduction(&state, request.cost);

        if let WindowDeduction::Allowed { remaining } = deduction {
            self.record_estimate(&slot.key, WindowState {
                remaining,
                reset_at_ms: slot.reset_at_ms,
            });

            let limiter = self.clone();
            let credential_id = request.credential_id.to_string();
            let (cost, limit) = (request.cost, request.limit);
            tokio::spawn(async move {
                if let Err(e) = limiter.consume_authoritative(&credential_id, cost, limit, &slot).await {
                    warn!(credential_id = %credential_id, error = %e, "background rate limit deduction failed");
                }
            });
        }

        RateLimitOutcome {
            allowed: deduction.is_allowed(),
            limit: request.limit,
            remaining: deduction.remaining(),
            reset_at_ms: state.reset_at_ms,
        }
    }

    async fn consume_authoritative(
        &self,
        credential_id: &str,
        cost: u64,
        limit: u64,
        slot: &WindowSlot,
    ) -> Result<RateLimitOutcome, CoordinationError> {
        let mut attempt = 0u32;
        let mut backoff_ms = CAS_RETRY_INITIAL_BACKOFF_MS;

        loop {
            let current = self.read_window(&slot.key).await?;
            let (state, expected) = match current {
                Some((state, raw)) => (state, Some(raw)),
                None => (fresh_window(limit, slot.reset_at_ms), None),
            };

            let remaining = match check_window_deduction(&state, cost) {
                WindowDeduction::Allowed { remaining } => remaining,
                WindowDeduction::Exhausted { remaining } => {
                    self.record_estimate(&slot.key, state);
                    debug!(credential_id, cost, remaining, "rate limit window exhausted");
                    return Ok(RateLimitOutcome {
                        allowed: false,
                        limit,
                        remaining,
                        reset_at_ms: state.reset_at_ms,
                    });
                }
            };

            let new_state = WindowState {
                remaining,
                reset_at_ms: state.reset_at_ms,
            };
            let created = expected.is_none();

            match self.cas_window(&slot.key, expected, &new_state).await {
                Ok(()) => {
                    self.record_estimate(&slot.key, new_state);
                    if created {
                        self.delete_previous_window(credential_id, slot.epoch).await;
                    }
                    debug!(
                        credential_id,
                        tokens_consumed = cost,
                        remaining,
                        reset_at_ms = new_state.reset_at_ms,
                        "rate limit tokens acquired"
                    );
                    return Ok(RateLimitOutcome {
                        allowed: true,
                        limit,
                        remaining,
                        reset_at_ms: new_state.reset_at_ms,
                    });
                }
                Err(CoordinationError::CasConflict) => {
                    attempt += 1;
                    if attempt >= self.config.max_cas_retries {
                        // Contention this heavy is itself a rate limit.
                        warn!(credential_id, attempts = attempt, "rate limit window contended, denying request");
                        return Ok(RateLimitOutcome {
                            allowed: false,
                            limit,
                            remaining: 0,
                            reset_at_ms: slot.reset_at_ms,
                        });
                    }
                    let backoff =
                        compute_backoff_with_jitter(backoff_ms, CAS_RETRY_MAX_BACKOFF_MS, rand::random::<f32>());
                    tokio::time::sleep(Duration::from_millis(backoff.sleep_ms)).await;
                    backoff_ms = backoff.next_backoff_ms;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read a window, returning its decoded state and the raw stored value.
    async fn read_window(&self, key: &str) -> Result<Option<(WindowState, String)>, CoordinationError> {
        match self.store.read(ReadRequest::new(key)).await {
            Ok(result) => {
                let state: WindowState =
                    serde_json::from_str(&result.value).map_err(|_| CoordinationError::CorruptedData {
                        key: key.to_string(),
                        reason: "invalid window state JSON".to_string(),
                    })?;
                Ok(Some((state, result.value)))
            }
            Err(KeyValueStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(CoordinationError::Storage { source: e }),
        }
    }

    async fn cas_window(&self, key: &str, expected: Option<String>, new: &WindowState) -> Result<(), CoordinationError> {
        let new_json = serde_json::to_string(new)?;
        match self.store.write(WriteRequest::compare_and_swap(key, expected, new_json)).await {
            Ok(_) => Ok(()),
            Err(KeyValueStoreError::CompareAndSwapFailed { .. }) => Err(CoordinationError::CasConflict),
            Err(e) => Err(CoordinationError::Storage { source: e }),
        }
    }

    async fn delete_previous_window(&self, credential_id: &str, epoch: u64) {
        let Some(previous) = epoch.checked_sub(1) else {
            return;
        };
        let key = window_key(credential_id, previous);
        self.estimates.lock().remove(&key);
        if let Err(e) = self.store.write(WriteRequest::delete(key.clone())).await {
            debug!(key = %key, error = %e, "previous rate limit window not deleted");
        }
    }

    /// Remaining budget within one window only goes down: a background
    /// deduction finishing late must not raise a newer local estimate.
    fn record_estimate(&self, key: &str, state: WindowState) {
        let now_ms = self.clock.now_ms();
        let mut estimates = self.estimates.lock();
        if let Some(existing) = estimates.get_mut(key) {
            if existing.reset_at_ms == state.reset_at_ms {
                existing.remaining = existing.remaining.min(state.remaining);
            } else {
                *existing = state;
            }
            return;
        }
        if estimates.len() >= MAX_TRACKED_WINDOWS {
            estimates.retain(|_, s| s.reset_at_ms > now_ms);
        }
        if estimates.len() < MAX_TRACKED_WINDOWS {
            estimates.insert(key.to_string(), state);
        }
    }
}
