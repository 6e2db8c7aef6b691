// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encrypted two-party session combining the X3DH key agreement with the message ratchet.
//!
//! A session keeps track of the ratchet secret we need to decrypt the next reply and of the
//! ratchet key of the other party our next message needs to be encrypted towards. All mutation
//! happens through `&mut self`, so a session can only ever have one writer.
//!
//! ## Example
//!
//! ```
//! # use p2panda_ratchet::{KeyManager, KeyManagerConfig, Rng, Session};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rng = Rng::default();
//!
//! let alice = KeyManager::new(&KeyManagerConfig::default(), &rng)?;
//! let bob = KeyManager::new(&KeyManagerConfig::default(), &rng)?;
//!
//! // Alice fetched Bob's published bundle and picks one of the one-time pre-keys.
//! let (mut alice_session, header) =
//!     Session::initiate(alice.identity_secret(), &bob.published_bundle(), 0, &rng)?;
//! let message = alice_session.send(b"Hello Bob!", &rng)?;
//!
//! // Bob receives the header together with the first message.
//! let mut bob_session = Session::respond(&bob, &header)?;
//! assert_eq!(bob_session.receive(&message)?, b"Hello Bob!");
//!
//! let reply = bob_session.send(b"Hello Alice!", &rng)?;
//! assert_eq!(alice_session.receive(&reply)?, b"Hello Alice!");
//! # Ok(())
//! # }
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::Rng;
use crate::crypto::x25519::{PublicKey, SecretKey};
use crate::key_bundle::{OneTimePreKeyIndex, PreKeyBundle};
use crate::key_manager::KeyManager;
use crate::ratchet::{Ratchet, RatchetError, RatchetMessage};
use crate::session_state::SessionState;
use crate::x3dh::{X3dhError, X3dhHeader, x3dh_initiate, x3dh_respond_with};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    state: SessionState,

    /// Secret of our latest ratchet key.
    our_ratchet_secret: SecretKey,

    their_identity_key: PublicKey,

    /// Ratchet key of the other party to use until we received a message from them.
    their_initial_ratchet_key: PublicKey,
}

impl Session {
    /// Establishes a session with the owner of the pre-key bundle.
    ///
    /// The returned header needs to be delivered to the other party, usually together with the
    /// first message.
    pub fn initiate(
        our_identity_secret: &SecretKey,
        their_bundle: &PreKeyBundle,
        onetime_prekey_index: OneTimePreKeyIndex,
        rng: &Rng,
    ) -> Result<(Self, X3dhHeader), SessionError> {
        let initiated = x3dh_initiate(our_identity_secret, their_bundle, onetime_prekey_index, rng)?;
        let session = Self {
            state: initiated.state,
            our_ratchet_secret: initiated.ephemeral_secret,
            their_identity_key: *their_bundle.identity_key(),
            their_initial_ratchet_key: *their_bundle.identity_key(),
        };
        Ok((session, initiated.header))
    }

    /// Establishes the session a header was created for.
    pub fn respond(manager: &KeyManager, header: &X3dhHeader) -> Result<Self, SessionError> {
        let state = x3dh_respond_with(manager, header)?;
        Ok(Self {
            state,
            our_ratchet_secret: manager.identity_secret().clone(),
            their_identity_key: header.identity_key,
            their_initial_ratchet_key: header.ephemeral_key,
        })
    }

    pub fn send(&mut self, plaintext: &[u8], rng: &Rng) -> Result<RatchetMessage, SessionError> {
        let their_ratchet_key = *self
            .state
            .receive_ratchet_key()
            .unwrap_or(&self.their_initial_ratchet_key);
        let (message, our_ratchet_secret) =
            Ratchet::encrypt(&mut self.state, plaintext, &their_ratchet_key, rng)?;
        self.our_ratchet_secret = our_ratchet_secret;
        Ok(message)
    }

    pub fn receive(&mut self, message: &RatchetMessage) -> Result<Vec<u8>, SessionError> {
        let plaintext = Ratchet::decrypt(&mut self.state, message, &self.our_ratchet_secret)?;
        Ok(plaintext)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn their_identity_key(&self) -> &PublicKey {
        &self.their_identity_key
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    X3dh(#[from] X3dhError),

    #[error(transparent)]
    Ratchet(#[from] RatchetError),
}
