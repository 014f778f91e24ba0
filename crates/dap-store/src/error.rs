use crate::backend::BackendType;

/// Errors from store, router, and manager operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key is absent from every backend consulted. `causes` lists the
    /// distinct per-backend failures, in the order they were observed.
    #[error("{}", fmt_not_found(.key, .causes))]
    NotFound { key: String, causes: Vec<String> },

    /// The blob exceeds the configured maximum; rejected before any I/O.
    #[error("blob is larger than max blob size: {size} bytes (max {max})")]
    OversizedBlob { size: usize, max: usize },

    /// The value failed integrity verification and must not be served.
    #[error("verification failed: {0}")]
    Verification(String),

    /// A precomputed-key mode was used without a caller-supplied key.
    #[error("commitment mode {0} requires a caller-supplied key")]
    MissingKey(dap_commitments::CommitmentMode),

    /// No backend is configured to serve the requested mode.
    #[error("no {backend} backend configured for commitment mode {mode}")]
    BackendUnavailable {
        backend: &'static str,
        mode: dap_commitments::CommitmentMode,
    },

    /// Transport or internal failure of a specific backend.
    #[error("{backend} backend error: {message}")]
    Backend {
        backend: BackendType,
        message: String,
    },

    /// I/O error from a local backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The replication router has been shut down.
    #[error("secondary router is shut down")]
    Shutdown,
}

impl StoreError {
    /// A plain miss for `key`, as reported by a single backend.
    pub fn not_found(key: &[u8]) -> Self {
        Self::NotFound {
            key: hex::encode(key),
            causes: Vec::new(),
        }
    }

    pub fn backend(backend: BackendType, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }

    /// Returns `true` for misses, including exhausted fallback chains.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for errors caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::OversizedBlob { .. } | Self::MissingKey(_))
    }
}

fn fmt_not_found(key: &str, causes: &[String]) -> String {
    if causes.is_empty() {
        format!("blob not found: {key}")
    } else {
        format!("blob not found: {key} ({})", causes.join("; "))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Invalid or contradictory backend configuration. Fatal at startup, but
/// always returned as a value.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown secondary target: {0}")]
    UnknownTarget(String),

    #[error("{0} cannot be used as a secondary target")]
    PrimaryOnlyTarget(BackendType),

    #[error("{0} backend is not configured but specified in targets")]
    TargetNotConfigured(BackendType),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
