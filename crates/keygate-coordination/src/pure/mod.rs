//! Pure functions extracted from the rate limiter.
//!
//! "Functional Core, Imperative Shell": the async limiter reads state, calls
//! into this module to decide, then writes. Everything here is deterministic
//! and side-effect free, which keeps it cheap to unit test and property test.
//!
//! # Tiger Style
//!
//! - All calculations use saturating arithmetic to prevent overflow/underflow
//! - Deterministic behavior (time and randomness passed as explicit parameters)
//! - No panics - all functions are total

pub mod window;

pub use window::check_window_deduction;
pub use window::compute_backoff_with_jitter;
pub use window::fresh_window;
pub use window::window_epoch;
pub use window::window_key;
pub use window::window_reset_at;
pub use window::BackoffResult;
pub use window::WindowDeduction;
