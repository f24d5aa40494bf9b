//! One-way digest of raw secrets.
//!
//! The digest is the only form in which a secret is ever stored or compared:
//! SHA-256 over the UTF-8 bytes, encoded as padded standard base64.

use std::fmt;

use base64::Engine;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::constants::DISPLAY_PREFIX_LEN;
use crate::constants::MAX_SECRET_SIZE;

/// Errors from hashing a raw secret.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The secret was empty.
    #[error("secret must not be empty")]
    EmptySecret,

    /// The secret exceeded [`MAX_SECRET_SIZE`].
    #[error("secret size {size} exceeds maximum of {max} bytes")]
    SecretTooLarge {
        /// Observed size in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: u32,
    },
}

/// Digest of a raw secret; the lookup key for credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyHash(String);

impl KeyHash {
    /// Wrap an already computed digest (e.g. loaded from storage).
    pub fn from_digest(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// The encoded digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash a raw secret into its lookup digest.
pub fn digest(secret: &str) -> Result<KeyHash, HashError> {
    if secret.is_empty() {
        return Err(HashError::EmptySecret);
    }
    if secret.len() > MAX_SECRET_SIZE as usize {
        return Err(HashError::SecretTooLarge {
            size: secret.len(),
            max: MAX_SECRET_SIZE,
        });
    }
    let hash = Sha256::digest(secret.as_bytes());
    Ok(KeyHash(base64::engine::general_purpose::STANDARD.encode(hash)))
}

/// Leading characters of a secret, safe to show in dashboards and logs.
pub fn display_prefix(secret: &str) -> String {
    secret.chars().take(DISPLAY_PREFIX_LEN).collect()
}
