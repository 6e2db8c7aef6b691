// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manager for our own secret key material.
//!
//! The key manager generates and holds the identity key, one signed pre-key and a batch of
//! one-time pre-keys of a party. Its public projection is the [`PreKeyBundle`] which can be
//! published for others to establish sessions with us.
//!
//! Persisting the manager (it is serializable) and tracking which one-time pre-keys have been
//! handed out is up to the application.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::crypto::x25519::{KeyPair, PublicKey, SecretKey};
use crate::crypto::xeddsa::XEdDSAError;
use crate::crypto::{Rng, RngError};
use crate::key_bundle::{OneTimePreKeyIndex, PreKeyBundle, SignedPreKey};

/// Number of one-time pre-keys generated when no other value is configured.
pub const DEFAULT_ONETIME_PREKEYS: usize = 100;

/// Configuration of a newly initialised key manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyManagerConfig {
    /// Number of one-time pre-keys generated in the first batch.
    pub onetime_prekeys: usize,
}

impl Default for KeyManagerConfig {
    fn default() -> Self {
        Self {
            onetime_prekeys: DEFAULT_ONETIME_PREKEYS,
        }
    }
}

/// Key manager to maintain secret key material (like our identity key) and to generate signed
/// public pre-key bundles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyManager {
    identity: KeyPair,
    signed_prekey: KeyPair,
    prekey: SignedPreKey,
    onetime_prekeys: Vec<KeyPair>,
}

impl KeyManager {
    /// Generates a new identity together with a signed pre-key and a batch of one-time pre-keys.
    pub fn new(config: &KeyManagerConfig, rng: &Rng) -> Result<Self, KeyManagerError> {
        let identity = Self::generate_key_pair(rng)?;
        Self::from_identity(identity.into_secret_key(), config, rng)
    }

    /// Initialises the manager for an already existing identity secret.
    pub fn from_identity(
        identity_secret: SecretKey,
        config: &KeyManagerConfig,
        rng: &Rng,
    ) -> Result<Self, KeyManagerError> {
        let identity = KeyPair::from_secret_key(identity_secret);

        let signed_prekey = Self::generate_key_pair(rng)?;
        let prekey = SignedPreKey::sign(*signed_prekey.public_key(), identity.secret_key(), rng)?;

        let mut manager = Self {
            identity,
            signed_prekey,
            prekey,
            onetime_prekeys: Vec::new(),
        };
        manager.generate_onetime_prekeys(config.onetime_prekeys, rng)?;

        debug!(
            identity_key = %manager.identity_key(),
            signed_prekey = %manager.prekey.key(),
            onetime_prekeys = manager.onetime_prekeys.len(),
            "initialised key manager"
        );

        Ok(manager)
    }

    /// Generates a fresh X25519 key pair.
    pub fn generate_key_pair(rng: &Rng) -> Result<KeyPair, KeyManagerError> {
        Ok(KeyPair::generate(rng)?)
    }

    /// Appends a batch of `count` independent one-time pre-keys.
    ///
    /// Existing one-time pre-keys keep their index, new ones are added to the end of the list.
    pub fn generate_onetime_prekeys(
        &mut self,
        count: usize,
        rng: &Rng,
    ) -> Result<(), KeyManagerError> {
        self.onetime_prekeys.reserve(count);
        for _ in 0..count {
            self.onetime_prekeys.push(Self::generate_key_pair(rng)?);
        }
        Ok(())
    }

    pub fn identity_key(&self) -> &PublicKey {
        self.identity.public_key()
    }

    pub fn identity_secret(&self) -> &SecretKey {
        self.identity.secret_key()
    }

    pub fn signed_prekey_secret(&self) -> &SecretKey {
        self.signed_prekey.secret_key()
    }

    /// Returns the secret of the one-time pre-key at `index`.
    pub fn onetime_secret(&self, index: OneTimePreKeyIndex) -> Result<&SecretKey, KeyManagerError> {
        usize::try_from(index)
            .ok()
            .and_then(|index| self.onetime_prekeys.get(index))
            .map(KeyPair::secret_key)
            .ok_or(KeyManagerError::InvalidIndex(index))
    }

    /// Returns the public key bundle which can be published on the network.
    pub fn published_bundle(&self) -> PreKeyBundle {
        PreKeyBundle::new(
            *self.identity.public_key(),
            self.prekey,
            self.onetime_prekeys
                .iter()
                .map(|key_pair| *key_pair.public_key())
                .collect(),
        )
    }
}

#[derive(Debug, Error)]
pub enum KeyManagerError {
    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    XEdDSA(#[from] XEdDSAError),

    #[error("could not find one-time pre-key secret with index {0}")]
    InvalidIndex(OneTimePreKeyIndex),
}
