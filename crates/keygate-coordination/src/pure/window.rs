//! Pure fixed-window rate limit computations.
//!
//! A window is identified by its epoch `floor(now / window_ms)`; all
//! requests landing in the same epoch share one token budget.
//!
//! # Tiger Style
//!
//! - Time is passed explicitly (no calls to system time)
//! - Saturating arithmetic throughout
//! - A zero window length is treated as 1ms so every function stays total

use crate::types::WindowState;

// ============================================================================
// Window Identity
// ============================================================================

/// Index of the window containing `now_ms`.
#[inline]
pub fn window_epoch(now_ms: u64, window_ms: u64) -> u64 {
    now_ms / window_ms.max(1)
}

/// When the window with the given epoch closes (Unix milliseconds).
#[inline]
pub fn window_reset_at(epoch: u64, window_ms: u64) -> u64 {
    let window_ms = window_ms.max(1);
    epoch.saturating_mul(window_ms).saturating_add(window_ms)
}

/// Storage key for one credential's window.
pub fn window_key(credential_id: &str, epoch: u64) -> String {
    format!("ratelimit:{credential_id}:{epoch}")
}

/// State of a window nobody has drawn from yet.
#[inline]
pub fn fresh_window(limit: u64, reset_at_ms: u64) -> WindowState {
    WindowState {
        remaining: limit,
        reset_at_ms,
    }
}

// ============================================================================
// Deduction
// ============================================================================

/// Result of checking a deduction against a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDeduction {
    /// The cost fits. Contains the balance after deducting it.
    Allowed {
        /// Tokens left after the deduction.
        remaining: u64,
    },
    /// The cost does not fit; the window is left untouched.
    Exhausted {
        /// Tokens currently left.
        remaining: u64,
    },
}

impl WindowDeduction {
    #[inline]
    pub fn is_allowed(&self) -> bool {
        matches!(self, WindowDeduction::Allowed { .. })
    }

    /// Balance to report to the caller.
    #[inline]
    pub fn remaining(&self) -> u64 {
        match self {
            WindowDeduction::Allowed { remaining } | WindowDeduction::Exhausted { remaining } => *remaining,
        }
    }
}

/// Check whether `cost` tokens can be drawn from `state`.
#[inline]
pub fn check_window_deduction(state: &WindowState, cost: u64) -> WindowDeduction {
    if cost <= state.remaining {
        WindowDeduction::Allowed {
            remaining: state.remaining - cost,
        }
    } else {
        WindowDeduction::Exhausted {
            remaining: state.remaining,
        }
    }
}

// ============================================================================
// Backoff
// ============================================================================

/// Sleep and next base delay for one CAS retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffResult {
    /// How long to sleep before the next attempt.
    pub sleep_ms: u64,
    /// Base delay for the attempt after that.
    pub next_backoff_ms: u64,
}

/// Exponential backoff with up to 50% jitter.
///
/// `random_value` is expected in `[0, 1]`; values outside are clamped.
#[inline]
pub fn compute_backoff_with_jitter(backoff_ms: u64, max_backoff_ms: u64, random_value: f32) -> BackoffResult {
    let jitter_range = backoff_ms / 2;
    let jitter = (jitter_range as f32 * random_value.clamp(0.0, 1.0)) as u64;
    BackoffResult {
        sleep_ms: backoff_ms.saturating_add(jitter),
        next_backoff_ms: backoff_ms.saturating_mul(2).min(max_backoff_ms),
    }
}
