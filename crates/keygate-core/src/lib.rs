//! Core types and contracts for keygate.
//!
//! - **Data model**: [`Credential`], [`Workspace`], [`ApiConfig`], [`Permission`]
//! - **Hashing**: [`digest`] turns a raw secret into the [`KeyHash`] lookup key
//! - **Store contracts**: [`CredentialStore`] (lookups and the atomic usage
//!   decrement) and [`KeyValueStore`] (CAS storage for rate-limit windows)
//! - **In-memory backends**: deterministic implementations of both contracts

pub mod constants;
pub mod hash;
pub mod inmemory;
pub mod kv;
pub mod store;
pub mod types;

pub use constants::CAS_RETRY_INITIAL_BACKOFF_MS;
pub use constants::CAS_RETRY_MAX_BACKOFF_MS;
pub use constants::DEFAULT_REQUEST_COST;
pub use constants::MAX_CAS_RETRIES;
pub use constants::MAX_SECRET_SIZE;
pub use constants::MAX_TRACKED_WINDOWS;
pub use constants::MIN_RATE_LIMIT_WINDOW_MS;
pub use hash::digest;
pub use hash::display_prefix;
pub use hash::HashError;
pub use hash::KeyHash;
pub use inmemory::DeterministicCredentialStore;
pub use inmemory::DeterministicKeyValueStore;
pub use inmemory::StoreFixtures;
pub use kv::KeyValueStore;
pub use kv::KeyValueStoreError;
pub use kv::ReadRequest;
pub use kv::ReadResult;
pub use kv::WriteCommand;
pub use kv::WriteRequest;
pub use kv::WriteResult;
pub use store::CredentialStore;
pub use store::QuotaDecrement;
pub use store::StoreError;
pub use types::ApiConfig;
pub use types::Credential;
pub use types::Permission;
pub use types::PermissionGrant;
pub use types::RateLimitConfig;
pub use types::Workspace;
