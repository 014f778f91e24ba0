use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of storage backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendType {
    /// The data-availability network (primary only).
    DataAvailability,
    /// In-memory DA stand-in (primary only).
    Memory,
    /// Object storage.
    ObjectStore,
    /// Key-value cache.
    KvCache,
    Unknown,
}

impl BackendType {
    /// Returns `true` for types that may only serve as the primary backend.
    pub fn is_primary_only(&self) -> bool {
        matches!(self, Self::DataAvailability | Self::Memory)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataAvailability => "eigenda",
            Self::Memory => "memory",
            Self::ObjectStore => "s3",
            Self::KvCache => "redis",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = std::convert::Infallible;

    /// Unrecognised names parse as [`BackendType::Unknown`]; rejecting them
    /// is the target registry's job.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "eigenda" | "da" => Self::DataAvailability,
            "memory" | "memstore" => Self::Memory,
            "s3" | "object-store" | "objectstore" => Self::ObjectStore,
            "redis" | "kv-cache" | "kvcache" => Self::KvCache,
            _ => Self::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> BackendType {
        s.parse().unwrap()
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!(parse("EigenDA"), BackendType::DataAvailability);
        assert_eq!(parse("memory"), BackendType::Memory);
        assert_eq!(parse("S3"), BackendType::ObjectStore);
        assert_eq!(parse("object-store"), BackendType::ObjectStore);
        assert_eq!(parse(" redis "), BackendType::KvCache);
        assert_eq!(parse("kv-cache"), BackendType::KvCache);
    }

    #[test]
    fn unrecognised_is_unknown() {
        assert_eq!(parse("gcs"), BackendType::Unknown);
        assert_eq!(parse(""), BackendType::Unknown);
    }

    #[test]
    fn display_roundtrips() {
        for b in [
            BackendType::DataAvailability,
            BackendType::Memory,
            BackendType::ObjectStore,
            BackendType::KvCache,
        ] {
            assert_eq!(parse(&b.to_string()), b);
        }
    }

    #[test]
    fn primary_only_types() {
        assert!(BackendType::DataAvailability.is_primary_only());
        assert!(BackendType::Memory.is_primary_only());
        assert!(!BackendType::ObjectStore.is_primary_only());
        assert!(!BackendType::KvCache.is_primary_only());
    }
}
