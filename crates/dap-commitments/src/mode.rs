use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Client-facing commitment convention.
///
/// The mode decides both how a commitment is wrapped on the wire and which
/// primary store capability serves the request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitmentMode {
    /// Content-addressed; the DA backend assigns the commitment.
    #[serde(rename = "simple")]
    Simple,
    /// Bridge convention keyed by `keccak256(blob)`; the caller owns the key.
    #[serde(rename = "optimism_keccak256")]
    BridgeKeccak,
    /// Bridge convention wrapping a DA-assigned commitment.
    #[serde(rename = "optimism_generic")]
    BridgeGeneric,
}

impl CommitmentMode {
    /// All supported modes.
    pub const ALL: [CommitmentMode; 3] = [Self::Simple, Self::BridgeKeccak, Self::BridgeGeneric];

    /// Canonical string form, as used in query parameters and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::BridgeKeccak => "optimism_keccak256",
            Self::BridgeGeneric => "optimism_generic",
        }
    }

    /// Returns `true` if the caller supplies the key (precomputed-key modes).
    pub fn is_precomputed(&self) -> bool {
        matches!(self, Self::BridgeKeccak)
    }
}

impl fmt::Display for CommitmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitmentMode {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "optimism_keccak256" | "op_keccak" => Ok(Self::BridgeKeccak),
            "optimism_generic" | "op_generic" => Ok(Self::BridgeGeneric),
            other => Err(DecodeError::UnknownMode(other.to_string())),
        }
    }
}

/// Certificate version carried in front of DA-assigned commitments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CertVersion {
    V0 = 0x00,
}

impl CertVersion {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CertVersion {
    type Error = DecodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x00 => Ok(Self::V0),
            other => Err(DecodeError::UnknownVersion(other)),
        }
    }
}

impl fmt::Display for CertVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_byte())
    }
}

/// Per-request dispatch key: resolved from the route before any backend call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitmentMeta {
    pub mode: CommitmentMode,
    pub cert_version: CertVersion,
}

impl CommitmentMeta {
    pub fn new(mode: CommitmentMode, cert_version: CertVersion) -> Self {
        Self { mode, cert_version }
    }

    /// Meta for a freshly written blob; writes always produce V0 certificates.
    pub fn for_put(mode: CommitmentMode) -> Self {
        Self::new(mode, CertVersion::V0)
    }
}

impl fmt::Display for CommitmentMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mode, self.cert_version)
    }
}
