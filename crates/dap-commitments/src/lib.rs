//! Commitment encoding for the DA proxy.
//!
//! Every blob stored through the proxy is identified by a *commitment*: the
//! opaque bytes a backend hands back on write (or the caller-chosen key for
//! precomputed-key modes). Rollup clients speak several incompatible
//! conventions for wrapping those bytes, so this crate owns the mapping
//! between a raw commitment and its client-visible encoding.
//!
//! # Modes
//!
//! - [`CommitmentMode::Simple`] -- `[cert version][commitment]`
//! - [`CommitmentMode::BridgeGeneric`] -- `[0x01][da layer][cert version][commitment]`
//! - [`CommitmentMode::BridgeKeccak`] -- `[0x00][keccak256(blob)]`, cert version fixed
//!
//! # Rules
//!
//! 1. Decoding never touches a backend; malformed input fails with
//!    [`DecodeError`] before any I/O.
//! 2. `decode(encode(c, mode), mode) == (c, CertVersion::V0)` for every mode.

pub mod codec;
pub mod error;
pub mod mode;

pub use codec::{decode, decode_hex, detect_bridge_mode, encode, keccak256};
pub use error::DecodeError;
pub use mode::{CertVersion, CommitmentMeta, CommitmentMode};
