// SPDX-License-Identifier: MIT OR Apache-2.0

//! Elliptic-curve Diffie–Hellman (ECDH) key agreement scheme (X25519).
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{Rng, RngError, Secret};

/// 256-bit secret key size.
pub const SECRET_KEY_SIZE: usize = 32;

/// 256-bit public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// 256-bit shared secret size.
pub const SHARED_SECRET_SIZE: usize = 32;

/// Secret Curve25519 key used for ECDH key agreement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKey(Secret<SECRET_KEY_SIZE>);

impl SecretKey {
    pub fn from_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        // Clamping
        let mut bytes = bytes;
        bytes[0] &= 248u8;
        bytes[31] &= 127u8;
        bytes[31] |= 64u8;
        SecretKey(Secret::from_bytes(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; SECRET_KEY_SIZE] {
        self.0.as_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        let secret = x25519_dalek::StaticSecret::from(*self.as_bytes());
        PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }

    /// Computes the shared secret between our secret key and their public key.
    ///
    /// Fails when the result is all-zero, which happens for low-order points on the curve.
    pub(crate) fn calculate_agreement(
        &self,
        their_public: &PublicKey,
    ) -> Result<Secret<SHARED_SECRET_SIZE>, X25519Error> {
        let secret = x25519_dalek::StaticSecret::from(*self.as_bytes());
        let shared_secret =
            secret.diffie_hellman(&x25519_dalek::PublicKey::from(their_public.to_bytes()));
        if !shared_secret.was_contributory() {
            return Err(X25519Error::KeyAgreementFailure);
        }
        Ok(Secret::from_bytes(shared_secret.to_bytes()))
    }
}

/// Public Curve25519 key used for ECDH key agreement.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "serde_bytes")] [u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(public_key: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(public_key)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Secret key together with its public counterpart.
///
/// The public key can be shared by value, the secret stays with the party which generated it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generates a fresh key pair from the given random source.
    pub fn generate(rng: &Rng) -> Result<Self, RngError> {
        Ok(Self::from_secret_key(SecretKey::from_bytes(
            rng.random_array()?,
        )))
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = secret_key.public_key();
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn into_secret_key(self) -> SecretKey {
        self.secret_key
    }
}

#[derive(Debug, Error)]
pub enum X25519Error {
    #[error("key agreement failed: public key is of low order")]
    KeyAgreementFailure,
}
