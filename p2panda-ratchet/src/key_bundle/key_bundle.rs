// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bytes::{ByteReader, SerializationError, write_varu64};
use crate::crypto::x25519::{PUBLIC_KEY_SIZE, PublicKey};
use crate::crypto::xeddsa::{SIGNATURE_SIZE, XEdDSAError, XSignature};
use crate::key_bundle::{OneTimePreKeyIndex, SignedPreKey};

/// Publishable key material of a party: identity key, signed pre-key and an ordered list of
/// one-time pre-keys.
///
/// Bundles are immutable once published. Each one-time pre-key is meant to be used for exactly
/// one session; keeping track of which ones were handed out is up to the application or server
/// distributing the bundles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKeyBundle {
    identity_key: PublicKey,
    signed_prekey: SignedPreKey,
    onetime_prekeys: Vec<PublicKey>,
}

impl PreKeyBundle {
    pub fn new(
        identity_key: PublicKey,
        signed_prekey: SignedPreKey,
        onetime_prekeys: Vec<PublicKey>,
    ) -> Self {
        Self {
            identity_key,
            signed_prekey,
            onetime_prekeys,
        }
    }

    pub fn identity_key(&self) -> &PublicKey {
        &self.identity_key
    }

    pub fn signed_prekey(&self) -> &PublicKey {
        self.signed_prekey.key()
    }

    pub fn prekey_signature(&self) -> &XSignature {
        self.signed_prekey.signature()
    }

    pub fn onetime_prekeys(&self) -> &[PublicKey] {
        &self.onetime_prekeys
    }

    /// Returns the one-time pre-key at `index`.
    pub fn onetime_prekey(&self, index: OneTimePreKeyIndex) -> Result<&PublicKey, KeyBundleError> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.onetime_prekeys.get(index))
            .ok_or(KeyBundleError::InvalidIndex(index, self.onetime_prekeys.len()))
    }

    /// Checks the signature of the pre-key against the identity key.
    pub fn verify(&self) -> Result<(), KeyBundleError> {
        self.signed_prekey.verify(&self.identity_key)?;
        Ok(())
    }

    /// Encodes the bundle as `identity ‖ signed pre-key ‖ signature ‖ count ‖ one-time keys`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            PUBLIC_KEY_SIZE * 2 + SIGNATURE_SIZE + 9 + PUBLIC_KEY_SIZE * self.onetime_prekeys.len(),
        );
        buf.extend_from_slice(self.identity_key.as_bytes());
        buf.extend_from_slice(self.signed_prekey.as_bytes());
        buf.extend_from_slice(self.signed_prekey.signature().as_bytes());
        write_varu64(&mut buf, self.onetime_prekeys.len() as u64);
        for onetime_prekey in &self.onetime_prekeys {
            buf.extend_from_slice(onetime_prekey.as_bytes());
        }
        buf
    }

    /// Decodes a bundle from its byte representation.
    ///
    /// Note that this does not verify the signature, call `verify` before using the bundle.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyBundleError> {
        let mut reader = ByteReader::new(bytes);

        let identity_key = PublicKey::from_bytes(reader.read_array()?);
        let signed_prekey = SignedPreKey::new(
            PublicKey::from_bytes(reader.read_array()?),
            XSignature::from_bytes(reader.read_array()?),
        );

        let count = reader.read_varu64()?;
        let expected = usize::try_from(count)
            .ok()
            .and_then(|count| count.checked_mul(PUBLIC_KEY_SIZE))
            .ok_or_else(|| SerializationError::InvalidLength {
                expected: usize::MAX,
                actual: reader.remaining(),
            })?;
        if expected != reader.remaining() {
            return Err(SerializationError::InvalidLength {
                expected,
                actual: reader.remaining(),
            }
            .into());
        }

        let mut onetime_prekeys = Vec::with_capacity(expected / PUBLIC_KEY_SIZE);
        for _ in 0..count {
            onetime_prekeys.push(PublicKey::from_bytes(reader.read_array()?));
        }
        reader.finish()?;

        Ok(Self {
            identity_key,
            signed_prekey,
            onetime_prekeys,
        })
    }
}

#[derive(Debug, Error)]
pub enum KeyBundleError {
    #[error("one-time pre-key index {0} is out of bounds, bundle holds {1} keys")]
    InvalidIndex(OneTimePreKeyIndex, usize),

    #[error("invalid pre-key signature: {0}")]
    InvalidSignature(#[from] XEdDSAError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use crate::bytes::{SerializationError, write_varu64};
    use crate::crypto::Rng;
    use crate::crypto::x25519::{PublicKey, SecretKey};
    use crate::crypto::xeddsa::xeddsa_sign;
    use crate::key_bundle::SignedPreKey;

    use super::{KeyBundleError, PreKeyBundle};

    fn make_bundle(onetime_prekeys: usize) -> PreKeyBundle {
        let rng = Rng::from_seed([1; 32]);

        let identity_secret = SecretKey::from_bytes(rng.random_array().unwrap());
        let prekey_secret = SecretKey::from_bytes(rng.random_array().unwrap());
        let signed_prekey =
            SignedPreKey::sign(prekey_secret.public_key(), &identity_secret, &rng).unwrap();

        let onetime_prekeys = (0..onetime_prekeys)
            .map(|_| SecretKey::from_bytes(rng.random_array().unwrap()).public_key())
            .collect();

        PreKeyBundle::new(identity_secret.public_key(), signed_prekey, onetime_prekeys)
    }

    #[fixture]
    fn bundle() -> PreKeyBundle {
        make_bundle(3)
    }

    #[rstest]
    fn verify(bundle: PreKeyBundle) {
        assert!(bundle.verify().is_ok());

        // Signature over different bytes.
        let rng = Rng::from_seed([2; 32]);
        let other_secret = SecretKey::from_bytes(rng.random_array().unwrap());
        let invalid = PreKeyBundle::new(
            *bundle.identity_key(),
            SignedPreKey::new(
                *bundle.signed_prekey(),
                xeddsa_sign(b"wrong payload", &other_secret, &rng).unwrap(),
            ),
            bundle.onetime_prekeys().to_vec(),
        );
        assert!(matches!(
            invalid.verify(),
            Err(KeyBundleError::InvalidSignature(_))
        ));
    }

    #[rstest]
    fn onetime_prekey_bounds(bundle: PreKeyBundle) {
        assert!(bundle.onetime_prekey(0).is_ok());
        assert!(bundle.onetime_prekey(2).is_ok());
        assert!(matches!(
            bundle.onetime_prekey(3),
            Err(KeyBundleError::InvalidIndex(3, 3))
        ));
        assert!(matches!(
            bundle.onetime_prekey(u64::MAX),
            Err(KeyBundleError::InvalidIndex(_, 3))
        ));
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(100)]
    fn byte_layout(#[case] onetime_prekeys: usize) {
        let bundle = make_bundle(onetime_prekeys);
        let bytes = bundle.to_bytes();

        assert_eq!(&bytes[..32], bundle.identity_key().as_bytes());
        assert_eq!(&bytes[32..64], bundle.signed_prekey().as_bytes());
        assert_eq!(&bytes[64..128], bundle.prekey_signature().as_bytes());
        if let Some(last) = bundle.onetime_prekeys().last() {
            assert_eq!(&bytes[bytes.len() - 32..], last.as_bytes());
        }

        let decoded = PreKeyBundle::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, bundle);
        assert!(decoded.verify().is_ok());
    }

    #[rstest]
    fn malformed_bytes(bundle: PreKeyBundle) {
        let bytes = bundle.to_bytes();

        // Truncated in the middle of the fixed-size header.
        assert!(matches!(
            PreKeyBundle::from_bytes(&bytes[..40]),
            Err(KeyBundleError::Serialization(
                SerializationError::InvalidLength { .. }
            ))
        ));

        // Missing the last one-time pre-key.
        assert!(matches!(
            PreKeyBundle::from_bytes(&bytes[..bytes.len() - 32]),
            Err(KeyBundleError::Serialization(
                SerializationError::InvalidLength { .. }
            ))
        ));

        // Unexpected extra bytes.
        let mut extended = bytes.clone();
        extended.push(0);
        assert!(matches!(
            PreKeyBundle::from_bytes(&extended),
            Err(KeyBundleError::Serialization(
                SerializationError::InvalidLength { .. }
            ))
        ));

        // Count announces more keys than there are bytes.
        let mut lying = bytes[..128].to_vec();
        lying.push(200);
        lying.extend_from_slice(PublicKey::from_bytes([1; 32]).as_bytes());
        assert!(PreKeyBundle::from_bytes(&lying).is_err());
    }

    #[rstest]
    fn oversized_count(bundle: PreKeyBundle) {
        let bytes = bundle.to_bytes();

        // Valid varint whose key count can not be represented in memory.
        let mut oversized = bytes[..128].to_vec();
        write_varu64(&mut oversized, u64::MAX);
        oversized.extend_from_slice(PublicKey::from_bytes([1; 32]).as_bytes());

        assert!(matches!(
            PreKeyBundle::from_bytes(&oversized),
            Err(KeyBundleError::Serialization(
                SerializationError::InvalidLength {
                    expected: usize::MAX,
                    actual: 32,
                }
            ))
        ));
    }
}
