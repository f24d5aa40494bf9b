//! Fixed limits shared across keygate crates.
//!
//! Tiger Style: every bound is explicit so a hostile request cannot make the
//! verifier allocate or retry without limit.

// ============================================================================
// Secrets
// ============================================================================

/// Maximum accepted raw secret length in bytes (4 KB).
///
/// Real keys are a prefix plus ~22 base58 characters; anything this large is
/// rejected before hashing.
pub const MAX_SECRET_SIZE: u32 = 4 * 1024;

/// Number of leading secret characters stored as the display prefix.
pub const DISPLAY_PREFIX_LEN: usize = 8;

// ============================================================================
// Key-value store limits
// ============================================================================

/// Maximum size of a window-store key in bytes (1 KB).
pub const MAX_KEY_SIZE: u32 = 1024;

/// Maximum size of a window-store value in bytes (64 KB).
pub const MAX_VALUE_SIZE: u32 = 64 * 1024;

// ============================================================================
// CAS retry policy
// ============================================================================

/// Maximum CAS attempts before a contended rate-limit window gives up.
pub const MAX_CAS_RETRIES: u32 = 100;

/// Initial backoff between CAS attempts in milliseconds.
pub const CAS_RETRY_INITIAL_BACKOFF_MS: u64 = 1;

/// Backoff ceiling between CAS attempts in milliseconds.
pub const CAS_RETRY_MAX_BACKOFF_MS: u64 = 64;

// ============================================================================
// Verification
// ============================================================================

/// Tokens charged when a request carries no explicit rate-limit cost.
pub const DEFAULT_REQUEST_COST: u64 = 1;

/// Smallest accepted rate-limit window (1 second).
pub const MIN_RATE_LIMIT_WINDOW_MS: u64 = 1_000;

// ============================================================================
// Rate limiting
// ============================================================================

/// Maximum number of windows a limiter keeps local estimates for.
///
/// Expired windows are pruned first; past this bound new estimates are not
/// recorded and async checks fall back to allowing the request.
pub const MAX_TRACKED_WINDOWS: usize = 10_000;
