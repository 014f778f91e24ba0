use thiserror::Error;

/// Errors produced while decoding a client-supplied commitment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("commitment too short: need at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unsupported certificate version byte: {0:#04x}")]
    UnknownVersion(u8),

    #[error("unexpected prefix byte for {mode}: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedPrefix {
        mode: &'static str,
        expected: u8,
        actual: u8,
    },

    #[error("unknown commitment mode: {0}")]
    UnknownMode(String),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}
