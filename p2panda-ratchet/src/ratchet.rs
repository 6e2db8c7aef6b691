// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-step Diffie-Hellman ratchet.
//!
//! Every outgoing message introduces a fresh ratchet key pair. The shared secret between the new
//! secret and the latest known ratchet key of the other party advances the root key, from the new
//! root key a chain key is derived and from that one the key encrypting exactly this message:
//!
//! ```text
//! root  ──KDF(ss, "root")──▶ root'
//! root' ──KDF(ss, "chain")─▶ chain ──KDF("message")─▶ message key
//!                                  └─KDF("chain")───▶ chain'
//! ```
//!
//! Both parties share one root chain, messages therefore need to be processed in the same order
//! on both sides: a party only sends after it processed all messages of the other party. Messages
//! crossing each other on the wire fail authentication. Skipped or out-of-order messages are not
//! handled.
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{trace, warn};

use crate::crypto::hkdf::HkdfError;
use crate::crypto::x25519::{KeyPair, PublicKey, SecretKey, X25519Error};
use crate::crypto::xchacha20::{XAeadError, XAeadNonce, x_aead_decrypt, x_aead_encrypt};
use crate::crypto::{Rng, RngError, Secret};
use crate::session_state::{ChainKey, KEY_SIZE, RootKey, SessionState};

pub(crate) const ROOT_LABEL: &[u8] = b"root";

pub(crate) const CHAIN_LABEL: &[u8] = b"chain";

pub(crate) const MESSAGE_LABEL: &[u8] = b"message";

pub(crate) type MessageKey = Secret<KEY_SIZE>;

/// Encrypted message together with everything the receiver needs to derive its key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatchetMessage {
    /// Fresh ratchet public key of the sender, also used as associated data.
    pub ratchet_key: PublicKey,

    /// Random nonce used for this message.
    #[serde(with = "serde_bytes")]
    pub nonce: XAeadNonce,

    /// Ciphertext with appended authentication tag.
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
}

pub struct Ratchet;

impl Ratchet {
    /// Encrypts `plaintext` towards the ratchet key of the other party and advances our sending
    /// chain.
    ///
    /// Returns the message and the secret of the newly introduced ratchet key pair. The caller
    /// needs to keep the secret around to decrypt the reply of the other party.
    pub fn encrypt(
        y: &mut SessionState,
        plaintext: &[u8],
        their_ratchet_key: &PublicKey,
        rng: &Rng,
    ) -> Result<(RatchetMessage, SecretKey), RatchetError> {
        let our_ratchet = KeyPair::generate(rng)?;
        let shared_secret = our_ratchet
            .secret_key()
            .calculate_agreement(their_ratchet_key)?;

        let (root_key, chain_key) = kdf_root(&y.root_key, &shared_secret)?;
        let (message_key, chain_key) = kdf_chain(&chain_key)?;

        let nonce: XAeadNonce = rng.random_array()?;
        let ciphertext = x_aead_encrypt(
            message_key.as_bytes(),
            plaintext,
            nonce,
            Some(our_ratchet.public_key().as_bytes()),
        )?;

        trace!(
            ratchet_key = %our_ratchet.public_key(),
            their_ratchet_key = %their_ratchet_key,
            plaintext_len = plaintext.len(),
            ciphertext_len = ciphertext.len(),
            "advanced sending ratchet"
        );

        y.root_key = root_key;
        y.send_chain_key = chain_key;
        y.send_ratchet_key = *our_ratchet.public_key();

        Ok((
            RatchetMessage {
                ratchet_key: *our_ratchet.public_key(),
                nonce,
                ciphertext,
            },
            our_ratchet.into_secret_key(),
        ))
    }

    /// Decrypts a message of the other party with the secret of our latest ratchet key and
    /// advances our receiving chain.
    ///
    /// The state is only changed when the message could be authenticated.
    pub fn decrypt(
        y: &mut SessionState,
        message: &RatchetMessage,
        our_ratchet_secret: &SecretKey,
    ) -> Result<Vec<u8>, RatchetError> {
        let shared_secret = our_ratchet_secret.calculate_agreement(&message.ratchet_key)?;

        let (root_key, chain_key) = kdf_root(&y.root_key, &shared_secret)?;
        let (message_key, chain_key) = kdf_chain(&chain_key)?;

        let plaintext = x_aead_decrypt(
            message_key.as_bytes(),
            &message.ciphertext,
            message.nonce,
            Some(message.ratchet_key.as_bytes()),
        )
        .map_err(|_| {
            warn!(
                their_ratchet_key = %message.ratchet_key,
                "could not authenticate ratchet message"
            );
            RatchetError::AuthenticationFailure
        })?;

        trace!(
            their_ratchet_key = %message.ratchet_key,
            ciphertext_len = message.ciphertext.len(),
            plaintext_len = plaintext.len(),
            "advanced receiving ratchet"
        );

        y.root_key = root_key;
        y.receive_chain_key = chain_key;
        y.receive_ratchet_key = Some(message.ratchet_key);

        Ok(plaintext)
    }
}

/// Mixes a fresh shared secret into the root key and derives the chain key for the next message.
pub(crate) fn kdf_root(
    root_key: &RootKey,
    shared_secret: &Secret<KEY_SIZE>,
) -> Result<(RootKey, ChainKey), HkdfError> {
    let root_key = root_key.derive(shared_secret.as_bytes(), ROOT_LABEL)?;
    let chain_key = root_key.derive(shared_secret.as_bytes(), CHAIN_LABEL)?;
    Ok((root_key, chain_key))
}

/// Derives the message key and the successor of a chain key.
pub(crate) fn kdf_chain(chain_key: &ChainKey) -> Result<(MessageKey, ChainKey), HkdfError> {
    let message_key = chain_key.derive(&[], MESSAGE_LABEL)?;
    let chain_key = chain_key.derive(&[], CHAIN_LABEL)?;
    Ok((message_key, chain_key))
}

#[derive(Debug, Error)]
pub enum RatchetError {
    #[error("message could not be authenticated")]
    AuthenticationFailure,

    #[error(transparent)]
    KeyAgreementFailure(#[from] X25519Error),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    Hkdf(#[from] HkdfError),

    #[error(transparent)]
    Encrypt(#[from] XAeadError),
}
