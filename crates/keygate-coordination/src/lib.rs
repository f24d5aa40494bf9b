//! Shared counters for keygate.
//!
//! - [`WindowRateLimiter`]: fixed-window rate limiting over a CAS key-value store
//! - [`QuotaAccountant`]: atomic usage-budget decrements through the credential store
//!
//! Decision logic lives in [`pure`]; the types here only read, decide, write.

pub mod error;
pub mod pure;
pub mod quota;
pub mod rate_limiter;
pub mod types;

pub use error::CoordinationError;
pub use error::RateLimitError;
pub use quota::QuotaAccountant;
pub use rate_limiter::WindowRateLimiter;
pub use rate_limiter::WindowRateLimiterConfig;
pub use rate_limiter::WindowRequest;
pub use types::QuotaOutcome;
pub use types::RateLimitOutcome;
pub use types::WindowState;
