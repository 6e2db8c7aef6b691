// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encode and decode ratchet messages, X3DH headers, key bundles or whole sessions in [CBOR]
//! format for transport or storage.
//!
//! [CBOR]: https://cbor.io/
use std::io::Read;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(|err| match err {
        ciborium::ser::Error::Io(err) => EncodeError::Io(err),
        ciborium::ser::Error::Value(reason) => EncodeError::Value(reason),
    })?;
    Ok(bytes)
}

pub fn decode_cbor<T: for<'a> Deserialize<'a>, R: Read>(reader: R) -> Result<T, DecodeError> {
    ciborium::from_reader(reader).map_err(|err| match err {
        ciborium::de::Error::Io(err) => DecodeError::Io(err),
        ciborium::de::Error::Syntax(offset) => DecodeError::Syntax(offset),
        ciborium::de::Error::Semantic(offset, reason) => DecodeError::Semantic(offset, reason),
        ciborium::de::Error::RecursionLimitExceeded => DecodeError::RecursionLimitExceeded,
    })
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("could not write cbor bytes: {0}")]
    Io(std::io::Error),

    #[error("value can not be represented in cbor: {0}")]
    Value(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    /// Input ended early or could not be read.
    #[error("could not read cbor bytes: {0}")]
    Io(std::io::Error),

    #[error("invalid cbor syntax at byte {0}")]
    Syntax(usize),

    /// Well-formed cbor which does not describe the expected value, for example a public key with
    /// the wrong length.
    #[error("unexpected cbor value at byte {0:?}: {1}")]
    Semantic(Option<usize>, String),

    #[error("cbor input is nested too deeply")]
    RecursionLimitExceeded,
}

#[cfg(test)]
mod tests {
    use serde::Serialize;

    use crate::crypto::x25519::PublicKey;
    use crate::ratchet::RatchetMessage;
    use crate::x3dh::X3dhHeader;

    use super::{DecodeError, decode_cbor, encode_cbor};

    #[test]
    fn header() {
        let header = X3dhHeader {
            identity_key: PublicKey::from_bytes([1; 32]),
            ephemeral_key: PublicKey::from_bytes([2; 32]),
            onetime_prekey_index: 42,
        };
        let bytes = encode_cbor(&header).unwrap();
        let decoded: X3dhHeader = decode_cbor(&bytes[..]).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn truncated_message() {
        let message = RatchetMessage {
            ratchet_key: PublicKey::from_bytes([3; 32]),
            nonce: [4; 24],
            ciphertext: vec![5; 40],
        };
        let bytes = encode_cbor(&message).unwrap();

        let result: Result<RatchetMessage, DecodeError> = decode_cbor(&bytes[..bytes.len() - 8]);
        assert!(result.is_err());
    }

    #[test]
    fn wrong_nonce_length() {
        #[derive(Serialize)]
        struct ShortNonce {
            ratchet_key: PublicKey,
            #[serde(with = "serde_bytes")]
            nonce: [u8; 12],
            #[serde(with = "serde_bytes")]
            ciphertext: Vec<u8>,
        }

        let bytes = encode_cbor(&ShortNonce {
            ratchet_key: PublicKey::from_bytes([3; 32]),
            nonce: [4; 12],
            ciphertext: vec![5; 40],
        })
        .unwrap();

        let result: Result<RatchetMessage, DecodeError> = decode_cbor(&bytes[..]);
        assert!(result.is_err());
    }
}
