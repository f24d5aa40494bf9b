//! Shared state types for coordination primitives.

use serde::Deserialize;
use serde::Serialize;

/// Stored state of one fixed rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    /// Tokens left in the window.
    pub remaining: u64,
    /// When the window closes (Unix milliseconds).
    pub reset_at_ms: u64,
}

/// Result of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitOutcome {
    /// Whether the requested tokens were granted.
    pub allowed: bool,
    /// Configured tokens per window.
    pub limit: u64,
    /// Tokens left after this request (unchanged when denied).
    pub remaining: u64,
    /// When the current window closes (Unix milliseconds).
    pub reset_at_ms: u64,
}

/// Result of a usage quota decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaOutcome {
    /// Whether the cost was charged.
    pub ok: bool,
    /// Balance before the attempt; `None` for unlimited credentials.
    pub remaining_before: Option<u64>,
    /// Balance after the attempt; `None` for unlimited credentials.
    pub remaining_after: Option<u64>,
}
