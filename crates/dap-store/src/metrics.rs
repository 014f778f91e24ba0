//! Advisory counters for the storage path.
//!
//! Counters are independent and monotonically increasing, so every access
//! uses `Ordering::Relaxed`. A [`MetricsSnapshot`] reads them one at a time
//! and may be slightly skewed between fields. Nothing in the control flow
//! reads these values.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct StoreMetrics {
    primary_hits: AtomicU64,
    primary_misses: AtomicU64,
    cache_hits: AtomicU64,
    fallback_hits: AtomicU64,
    verification_failures: AtomicU64,
    replication_enqueued: AtomicU64,
    replication_dropped: AtomicU64,
    replication_writes: AtomicU64,
    replication_failures: AtomicU64,
    fallback_write_failures: AtomicU64,
}

/// Point-in-time copy of [`StoreMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub primary_hits: u64,
    pub primary_misses: u64,
    pub cache_hits: u64,
    pub fallback_hits: u64,
    pub verification_failures: u64,
    pub replication_enqueued: u64,
    pub replication_dropped: u64,
    pub replication_writes: u64,
    pub replication_failures: u64,
    pub fallback_write_failures: u64,
}

macro_rules! counter {
    ($record:ident, $field:ident) => {
        pub fn $record(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_primary_hit, primary_hits);
    counter!(record_primary_miss, primary_misses);
    counter!(record_cache_hit, cache_hits);
    counter!(record_fallback_hit, fallback_hits);
    counter!(record_verification_failure, verification_failures);
    counter!(record_replication_enqueued, replication_enqueued);
    counter!(record_replication_dropped, replication_dropped);
    counter!(record_replication_write, replication_writes);
    counter!(record_replication_failure, replication_failures);
    counter!(record_fallback_write_failure, fallback_write_failures);

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            primary_hits: self.primary_hits.load(Ordering::Relaxed),
            primary_misses: self.primary_misses.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fallback_hits: self.fallback_hits.load(Ordering::Relaxed),
            verification_failures: self.verification_failures.load(Ordering::Relaxed),
            replication_enqueued: self.replication_enqueued.load(Ordering::Relaxed),
            replication_dropped: self.replication_dropped.load(Ordering::Relaxed),
            replication_writes: self.replication_writes.load(Ordering::Relaxed),
            replication_failures: self.replication_failures.load(Ordering::Relaxed),
            fallback_write_failures: self.fallback_write_failures.load(Ordering::Relaxed),
        }
    }
}
