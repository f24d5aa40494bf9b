//! API key verification.
//!
//! [`Verifier::verify`] turns a raw secret and an API id into a
//! [`VerifyResult`] or a hard [`VerifyError`]. Every suspending step runs
//! under a [`CallContext`] so a caller's deadline or cancellation stops the
//! pipeline before the next store call.

pub mod context;
pub mod decision;
pub mod error;
pub mod events;
pub mod permissions;
pub mod pipeline;
pub mod result;

pub use context::CallContext;
pub use error::VerifyError;
pub use events::BatchedEventSink;
pub use events::EventBatchConfig;
pub use events::EventFlusher;
pub use events::IngestError;
pub use events::NoopEventSink;
pub use events::TracingEventFlusher;
pub use events::VerificationEvent;
pub use events::VerificationEventSink;
pub use permissions::PermissionResolver;
pub use pipeline::Verifier;
pub use pipeline::VerifierConfig;
pub use pipeline::VerifyRequest;
pub use result::RateLimitState;
pub use result::VerifyCode;
pub use result::VerifyResult;
