// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::crypto::Rng;
use crate::crypto::x25519::{PUBLIC_KEY_SIZE, PublicKey, SecretKey};
use crate::crypto::xeddsa::{XEdDSAError, XSignature, xeddsa_sign, xeddsa_verify};

/// Position of a one-time pre-key in the ordered list of a published key bundle.
pub type OneTimePreKeyIndex = u64;

/// Medium-term pre-key with key material for X3DH, authenticated by the identity key.
///
/// The signature is an XEdDSA signature over the public bytes of the pre-key, made with the
/// X25519 identity secret of the same party.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPreKey {
    key: PublicKey,
    signature: XSignature,
}

impl SignedPreKey {
    pub fn new(key: PublicKey, signature: XSignature) -> Self {
        Self { key, signature }
    }

    /// Signs the public pre-key with our identity secret.
    pub fn sign(
        key: PublicKey,
        identity_secret: &SecretKey,
        rng: &Rng,
    ) -> Result<Self, XEdDSAError> {
        let signature = xeddsa_sign(key.as_bytes(), identity_secret, rng)?;
        Ok(Self { key, signature })
    }

    pub fn key(&self) -> &PublicKey {
        &self.key
    }

    pub fn signature(&self) -> &XSignature {
        &self.signature
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.key.as_bytes()
    }

    /// Checks that the pre-key was signed by the given identity.
    pub fn verify(&self, identity_key: &PublicKey) -> Result<(), XEdDSAError> {
        xeddsa_verify(self.key.as_bytes(), identity_key, &self.signature)
    }
}
