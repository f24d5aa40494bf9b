//! Error types for rate limiting and quota accounting.

use std::fmt;

use keygate_core::KeyValueStoreError;
use keygate_core::StoreError;
use snafu::Snafu;

/// Errors from coordination primitives.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CoordinationError {
    /// Data in storage is corrupted or unparseable.
    #[snafu(display("corrupted data in key '{key}': {reason}"))]
    CorruptedData {
        /// The key with corrupted data.
        key: String,
        /// Description of what went wrong.
        reason: String,
    },

    /// CAS operation failed, retry may succeed.
    #[snafu(display("CAS conflict, retry needed"))]
    CasConflict,

    /// Underlying window store error.
    #[snafu(display("storage error: {source}"))]
    Storage {
        /// The underlying error.
        source: KeyValueStoreError,
    },

    /// Underlying credential store error.
    #[snafu(display("credential store error: {source}"))]
    QuotaStore {
        /// The underlying error.
        source: StoreError,
    },

    /// The credential disappeared between lookup and decrement.
    #[snafu(display("credential '{credential_id}' not found"))]
    UnknownCredential {
        /// The credential that was charged.
        credential_id: String,
    },

    /// JSON serialization/deserialization error.
    #[snafu(display("serialization error: {source}"))]
    Serialization {
        /// The underlying error.
        source: serde_json::Error,
    },
}

impl From<KeyValueStoreError> for CoordinationError {
    fn from(source: KeyValueStoreError) -> Self {
        CoordinationError::Storage { source }
    }
}

impl From<StoreError> for CoordinationError {
    fn from(source: StoreError) -> Self {
        CoordinationError::QuotaStore { source }
    }
}

impl From<serde_json::Error> for CoordinationError {
    fn from(source: serde_json::Error) -> Self {
        CoordinationError::Serialization { source }
    }
}

/// Error when the rate limit state cannot be determined.
///
/// Running out of tokens is not an error: it is reported through
/// [`RateLimitOutcome::allowed`](crate::RateLimitOutcome). These variants mean
/// the limiter could not reach a decision at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    /// The window length is below the accepted minimum.
    InvalidWindow {
        /// Configured window length.
        window_ms: u64,
        /// Smallest accepted window length.
        min_window_ms: u64,
    },
    /// Storage unavailable or holding unreadable window state.
    StorageUnavailable {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::InvalidWindow {
                window_ms,
                min_window_ms,
            } => write!(f, "invalid rate limit window: {}ms is below the minimum of {}ms", window_ms, min_window_ms),
            RateLimitError::StorageUnavailable { reason } => {
                write!(f, "rate limiter storage unavailable: {}", reason)
            }
        }
    }
}

impl std::error::Error for RateLimitError {}

impl From<CoordinationError> for RateLimitError {
    fn from(err: CoordinationError) -> Self {
        RateLimitError::StorageUnavailable { reason: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_error_display() {
        let err = RateLimitError::InvalidWindow {
            window_ms: 10,
            min_window_ms: 1000,
        };
        assert_eq!(err.to_string(), "invalid rate limit window: 10ms is below the minimum of 1000ms");
    }

    #[test]
    fn coordination_error_becomes_storage_unavailable() {
        let err: RateLimitError = CoordinationError::from(KeyValueStoreError::Failed {
            reason: "disk full".into(),
        })
        .into();
        assert_eq!(
            err,
            RateLimitError::StorageUnavailable {
                reason: "storage error: operation failed: disk full".into()
            }
        );
    }
}
