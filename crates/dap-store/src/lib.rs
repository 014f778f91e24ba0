//! Storage routing for the DA proxy.
//!
//! The [`Manager`] dispatches each request to a primary backend chosen by
//! commitment mode, mirrors writes to secondary targets through the
//! [`SecondaryRouter`], and falls back to those targets when the primary
//! cannot serve a verified read.
//!
//! # Backends
//!
//! Every backend implements [`Store`] plus exactly one capability:
//!
//! - [`GeneratedKeyStore`] -- the backend derives the key (`MemStore`)
//! - [`PrecomputedKeyStore`] -- the caller owns the key (`FsObjectStore`, `KvCacheStore`)
//!
//! # Rules
//!
//! 1. Oversized blobs are rejected before any backend call.
//! 2. No value reaches a caller without passing the primary route's verification.
//! 3. Cache replication is at-most-once and never blocks the write path.
//! 4. Fallbacks are consulted strictly in configured order.
//! 5. Invalid target configuration is a [`ConfigError`], never a panic.

pub mod backend;
pub mod error;
pub mod kv;
pub mod manager;
pub mod memstore;
pub mod metrics;
pub mod object;
pub mod secondary;
pub mod targets;
pub mod traits;
pub mod verify;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use backend::BackendType;
pub use error::{ConfigError, StoreError, StoreResult};
pub use kv::KvCacheStore;
pub use manager::{Manager, ManagerConfig, PrimaryRoute};
pub use memstore::{MemStore, MemStoreConfig};
pub use metrics::{MetricsSnapshot, StoreMetrics};
pub use object::FsObjectStore;
pub use secondary::{Enqueued, SecondaryConfig, SecondaryRouter, TargetRole, WriteJob};
pub use targets::{populate_targets, resolve_target, SecondaryBackends};
pub use traits::{GeneratedKeyStore, PrecomputedKeyStore, Store};
pub use verify::{DigestVerifier, NoopVerifier, Verifier};
