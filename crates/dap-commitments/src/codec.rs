use sha3::{Digest, Keccak256};

use crate::error::DecodeError;
use crate::mode::{CertVersion, CommitmentMode};

/// Bridge commitment-type byte for keccak-keyed commitments.
pub const KECCAK_COMMITMENT_BYTE: u8 = 0x00;
/// Bridge commitment-type byte for generic (DA-assigned) commitments.
pub const GENERIC_COMMITMENT_BYTE: u8 = 0x01;
/// DA-layer byte identifying this proxy's DA network inside generic commitments.
pub const DA_LAYER_BYTE: u8 = 0x00;

/// Wrap a raw commitment in the client-visible encoding for `mode`.
///
/// DA-assigned modes always emit a [`CertVersion::V0`] certificate.
pub fn encode(commitment: &[u8], mode: CommitmentMode) -> Vec<u8> {
    match mode {
        CommitmentMode::Simple => {
            let mut buf = Vec::with_capacity(1 + commitment.len());
            buf.push(CertVersion::V0.as_byte());
            buf.extend_from_slice(commitment);
            buf
        }
        CommitmentMode::BridgeGeneric => {
            let mut buf = Vec::with_capacity(3 + commitment.len());
            buf.push(GENERIC_COMMITMENT_BYTE);
            buf.push(DA_LAYER_BYTE);
            buf.push(CertVersion::V0.as_byte());
            buf.extend_from_slice(commitment);
            buf
        }
        CommitmentMode::BridgeKeccak => {
            let mut buf = Vec::with_capacity(1 + commitment.len());
            buf.push(KECCAK_COMMITMENT_BYTE);
            buf.extend_from_slice(commitment);
            buf
        }
    }
}

/// Strip the `mode` encoding from `data`, returning the raw commitment and
/// its certificate version.
pub fn decode(data: &[u8], mode: CommitmentMode) -> Result<(Vec<u8>, CertVersion), DecodeError> {
    match mode {
        CommitmentMode::Simple => {
            let rest = require_len(data, 2)?;
            let version = CertVersion::try_from(rest[0])?;
            Ok((rest[1..].to_vec(), version))
        }
        CommitmentMode::BridgeGeneric => {
            let rest = require_len(data, 4)?;
            expect_prefix(mode, GENERIC_COMMITMENT_BYTE, rest[0])?;
            expect_prefix(mode, DA_LAYER_BYTE, rest[1])?;
            let version = CertVersion::try_from(rest[2])?;
            Ok((rest[3..].to_vec(), version))
        }
        CommitmentMode::BridgeKeccak => {
            let rest = require_len(data, 2)?;
            expect_prefix(mode, KECCAK_COMMITMENT_BYTE, rest[0])?;
            Ok((rest[1..].to_vec(), CertVersion::V0))
        }
    }
}

/// Infer the bridge mode of an encoded commitment from its type byte.
///
/// Simple commitments carry no type byte and are never detected.
pub fn detect_bridge_mode(encoded: &[u8]) -> Result<CommitmentMode, DecodeError> {
    match encoded.first() {
        Some(&KECCAK_COMMITMENT_BYTE) => Ok(CommitmentMode::BridgeKeccak),
        Some(&GENERIC_COMMITMENT_BYTE) => Ok(CommitmentMode::BridgeGeneric),
        Some(other) => Err(DecodeError::UnknownMode(format!(
            "commitment type byte {other:#04x}"
        ))),
        None => Err(DecodeError::Truncated {
            expected: 1,
            actual: 0,
        }),
    }
}

/// Parse a hex string with or without a leading `0x`.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    hex::decode(trimmed).map_err(|e| DecodeError::InvalidHex(e.to_string()))
}

/// Keccak-256 digest; the key space of [`CommitmentMode::BridgeKeccak`].
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

fn require_len(data: &[u8], expected: usize) -> Result<&[u8], DecodeError> {
    if data.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: data.len(),
        });
    }
    Ok(data)
}

fn expect_prefix(mode: CommitmentMode, expected: u8, actual: u8) -> Result<(), DecodeError> {
    if expected != actual {
        return Err(DecodeError::UnexpectedPrefix {
            mode: mode.as_str(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn simple_prepends_version() {
        assert_eq!(encode(&[0xaa, 0xbb], CommitmentMode::Simple), vec![0x00, 0xaa, 0xbb]);
    }

    #[test]
    fn generic_prepends_bridge_and_da_bytes() {
        assert_eq!(
            encode(&[0xaa], CommitmentMode::BridgeGeneric),
            vec![GENERIC_COMMITMENT_BYTE, DA_LAYER_BYTE, 0x00, 0xaa]
        );
    }

    #[test]
    fn keccak_omits_version() {
        let key = keccak256(b"blob");
        let encoded = encode(&key, CommitmentMode::BridgeKeccak);
        assert_eq!(encoded.len(), 33);
        assert_eq!(encoded[0], KECCAK_COMMITMENT_BYTE);
    }

    #[test]
    fn decode_truncated() {
        let err = decode(&[0x00], CommitmentMode::Simple).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { expected: 2, actual: 1 });

        let err = decode(&[0x01, 0x00, 0x00], CommitmentMode::BridgeGeneric).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));

        assert!(decode(&[], CommitmentMode::BridgeKeccak).is_err());
    }

    #[test]
    fn decode_unknown_version() {
        let err = decode(&[0x09, 0xaa], CommitmentMode::Simple).unwrap_err();
        assert_eq!(err, DecodeError::UnknownVersion(0x09));

        let err = decode(&[0x01, 0x00, 0x05, 0xaa], CommitmentMode::BridgeGeneric).unwrap_err();
        assert_eq!(err, DecodeError::UnknownVersion(0x05));
    }

    #[test]
    fn decode_wrong_prefix() {
        let err = decode(&[0x00, 0x00, 0x00, 0xaa], CommitmentMode::BridgeGeneric).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedPrefix { expected: 0x01, actual: 0x00, .. }));

        let err = decode(&[0x01, 0xaa], CommitmentMode::BridgeKeccak).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedPrefix { .. }));
    }

    #[test]
    fn type_byte_selects_bridge_mode() {
        assert_eq!(detect_bridge_mode(&[0x00, 0xaa]).unwrap(), CommitmentMode::BridgeKeccak);
        assert_eq!(detect_bridge_mode(&[0x01, 0x00]).unwrap(), CommitmentMode::BridgeGeneric);
        assert!(matches!(detect_bridge_mode(&[0x02]), Err(DecodeError::UnknownMode(_))));
        assert!(matches!(detect_bridge_mode(&[]), Err(DecodeError::Truncated { .. })));
    }

    #[test]
    fn decode_hex_accepts_prefix() {
        assert_eq!(decode_hex("0x00ff").unwrap(), vec![0x00, 0xff]);
        assert_eq!(decode_hex("00ff").unwrap(), vec![0x00, 0xff]);
        assert!(matches!(decode_hex("0xzz"), Err(DecodeError::InvalidHex(_))));
    }

    #[test]
    fn keccak_matches_known_vector() {
        // keccak256("") per the Ethereum yellow paper.
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            commitment in proptest::collection::vec(any::<u8>(), 1..96),
            mode_idx in 0usize..3,
        ) {
            let mode = CommitmentMode::ALL[mode_idx];
            let (decoded, version) = decode(&encode(&commitment, mode), mode).unwrap();
            prop_assert_eq!(decoded, commitment);
            prop_assert_eq!(version, CertVersion::V0);
        }
    }
}
