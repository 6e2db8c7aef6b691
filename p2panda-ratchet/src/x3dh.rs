// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extended Triple Diffie-Hellman (X3DH) key agreement.
//!
//! X3DH establishes a shared root key between two parties who mutually authenticate each other
//! based on public keys. It is designed for asynchronous settings where one party ("Bob") is
//! offline but has published a [`PreKeyBundle`]. Another party ("Alice") uses that bundle to
//! derive the root key right away, Bob derives the same key later from the [`X3dhHeader`] Alice
//! sends along with the first message.
//!
//! ```text
//! DH1 = DH(IK_A, SPK_B)
//! DH2 = DH(EK_A, IK_B)
//! DH3 = DH(EK_A, SPK_B)
//! DH4 = DH(EK_A, OPK_B)
//! root = HKDF(0x00 * 32, DH1 ‖ DH2 ‖ DH3 ‖ DH4, "p2panda-ratchet")
//! ```
//!
//! <https://signal.org/docs/specifications/x3dh/>
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::crypto::hkdf::{HkdfError, hkdf};
use crate::crypto::x25519::{KeyPair, PublicKey, SHARED_SECRET_SIZE, SecretKey, X25519Error};
use crate::crypto::{Rng, RngError, Secret};
use crate::key_bundle::{KeyBundleError, OneTimePreKeyIndex, PreKeyBundle};
use crate::key_manager::KeyManager;
use crate::ratchet::CHAIN_LABEL;
use crate::session_state::{KEY_SIZE, RootKey, SessionState};

/// ASCII string identifying the application as specified in X3DH used for KDF.
const KDF_INFO: &[u8] = b"p2panda-ratchet";

/// Public values the responder needs to complete the key agreement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct X3dhHeader {
    pub identity_key: PublicKey,
    pub ephemeral_key: PublicKey,
    pub onetime_prekey_index: OneTimePreKeyIndex,
}

/// Result of the initiating side of the key agreement.
#[derive(Debug)]
pub struct X3dhInitiated {
    pub state: SessionState,

    /// Secret of the ephemeral key, it doubles as our first ratchet key.
    pub ephemeral_secret: SecretKey,

    pub header: X3dhHeader,
}

/// Derives the session state of the initiating party from the other party's pre-key bundle.
///
/// The one-time pre-key index is checked before any other work is done. Afterwards the signature
/// of the signed pre-key is verified.
pub fn x3dh_initiate(
    our_identity_secret: &SecretKey,
    their_bundle: &PreKeyBundle,
    onetime_prekey_index: OneTimePreKeyIndex,
    rng: &Rng,
) -> Result<X3dhInitiated, X3dhError> {
    let their_onetime_prekey = their_bundle
        .onetime_prekey(onetime_prekey_index)
        .map_err(|_| X3dhError::InvalidIndex(onetime_prekey_index))?;

    their_bundle.verify().map_err(X3dhError::InvalidSignature)?;

    let our_identity_key = our_identity_secret.public_key();
    let our_ephemeral = KeyPair::generate(rng)?;
    let our_ephemeral_secret = our_ephemeral.secret_key();

    let root_key = derive_root_key([
        our_identity_secret.calculate_agreement(their_bundle.signed_prekey())?,
        our_ephemeral_secret.calculate_agreement(their_bundle.identity_key())?,
        our_ephemeral_secret.calculate_agreement(their_bundle.signed_prekey())?,
        our_ephemeral_secret.calculate_agreement(their_onetime_prekey)?,
    ])?;

    let state = SessionState {
        send_chain_key: root_key.derive(our_ephemeral.public_key().as_bytes(), CHAIN_LABEL)?,
        receive_chain_key: root_key.derive(their_bundle.identity_key().as_bytes(), CHAIN_LABEL)?,
        root_key,
        send_ratchet_key: *our_ephemeral.public_key(),
        receive_ratchet_key: None,
    };

    debug!(
        identity_key = %our_identity_key,
        their_identity_key = %their_bundle.identity_key(),
        ephemeral_key = %our_ephemeral.public_key(),
        onetime_prekey_index,
        "initiated x3dh key agreement"
    );

    let header = X3dhHeader {
        identity_key: our_identity_key,
        ephemeral_key: *our_ephemeral.public_key(),
        onetime_prekey_index,
    };

    Ok(X3dhInitiated {
        state,
        ephemeral_secret: our_ephemeral.into_secret_key(),
        header,
    })
}

/// Derives the session state of the responding party.
pub fn x3dh_respond(
    our_identity_secret: &SecretKey,
    our_signed_prekey_secret: &SecretKey,
    our_onetime_secret: &SecretKey,
    their_identity_key: &PublicKey,
    their_ephemeral_key: &PublicKey,
) -> Result<SessionState, X3dhError> {
    let our_identity_key = our_identity_secret.public_key();

    let root_key = derive_root_key([
        // DH1 = DH(IK_A, SPK_B)
        our_signed_prekey_secret.calculate_agreement(their_identity_key)?,
        // DH2 = DH(EK_A, IK_B)
        our_identity_secret.calculate_agreement(their_ephemeral_key)?,
        // DH3 = DH(EK_A, SPK_B)
        our_signed_prekey_secret.calculate_agreement(their_ephemeral_key)?,
        // DH4 = DH(EK_A, OPK_B)
        our_onetime_secret.calculate_agreement(their_ephemeral_key)?,
    ])?;

    let state = SessionState {
        send_chain_key: root_key.derive(our_identity_key.as_bytes(), CHAIN_LABEL)?,
        receive_chain_key: root_key.derive(their_ephemeral_key.as_bytes(), CHAIN_LABEL)?,
        root_key,
        send_ratchet_key: our_identity_key,
        receive_ratchet_key: None,
    };

    debug!(
        identity_key = %our_identity_key,
        their_identity_key = %their_identity_key,
        their_ephemeral_key = %their_ephemeral_key,
        "responded to x3dh key agreement"
    );

    Ok(state)
}

/// Looks up our secrets for the pre-keys referenced in the header and derives the session state
/// of the responding party.
pub fn x3dh_respond_with(
    manager: &KeyManager,
    header: &X3dhHeader,
) -> Result<SessionState, X3dhError> {
    let our_onetime_secret = manager
        .onetime_secret(header.onetime_prekey_index)
        .map_err(|_| X3dhError::InvalidIndex(header.onetime_prekey_index))?;

    x3dh_respond(
        manager.identity_secret(),
        manager.signed_prekey_secret(),
        our_onetime_secret,
        &header.identity_key,
        &header.ephemeral_key,
    )
}

fn derive_root_key(dh: [Secret<SHARED_SECRET_SIZE>; 4]) -> Result<RootKey, HkdfError> {
    let mut ikm = Zeroizing::new(Vec::with_capacity(SHARED_SECRET_SIZE * 4));
    for secret in &dh {
        ikm.extend_from_slice(secret.as_bytes());
    }
    let root_key: [u8; KEY_SIZE] = hkdf(&[0u8; KEY_SIZE], &ikm, Some(KDF_INFO))?;
    Ok(Secret::from_bytes(root_key))
}

#[derive(Debug, Error)]
pub enum X3dhError {
    #[error("one-time pre-key with index {0} does not exist")]
    InvalidIndex(OneTimePreKeyIndex),

    #[error("invalid pre-key bundle: {0}")]
    InvalidSignature(KeyBundleError),

    #[error(transparent)]
    KeyAgreementFailure(#[from] X25519Error),

    #[error(transparent)]
    Rng(#[from] RngError),

    #[error(transparent)]
    Hkdf(#[from] HkdfError),
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use crate::crypto::Rng;
    use crate::crypto::x25519::{PublicKey, SecretKey};
    use crate::crypto::xeddsa::xeddsa_sign;
    use crate::key_bundle::{PreKeyBundle, SignedPreKey};
    use crate::key_manager::{KeyManager, KeyManagerConfig};

    use super::{X3dhError, x3dh_initiate, x3dh_respond, x3dh_respond_with};

    struct Parties {
        rng: Rng,
        alice_identity_secret: SecretKey,
        bob: KeyManager,
    }

    #[fixture]
    fn parties() -> Parties {
        let rng = Rng::from_seed([1; 32]);
        let alice_identity_secret = SecretKey::from_bytes(rng.random_array().unwrap());
        let bob = KeyManager::new(&KeyManagerConfig { onetime_prekeys: 3 }, &rng).unwrap();
        Parties {
            rng,
            alice_identity_secret,
            bob,
        }
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(2)]
    fn root_keys_match(parties: Parties, #[case] index: u64) {
        let Parties {
            rng,
            alice_identity_secret,
            bob,
        } = parties;

        let alice = x3dh_initiate(
            &alice_identity_secret,
            &bob.published_bundle(),
            index,
            &rng,
        )
        .unwrap();
        assert_eq!(alice.header.onetime_prekey_index, index);
        assert_eq!(
            alice.header.identity_key,
            alice_identity_secret.public_key()
        );
        assert_eq!(
            alice.header.ephemeral_key,
            alice.ephemeral_secret.public_key()
        );

        let bob_state = x3dh_respond(
            bob.identity_secret(),
            bob.signed_prekey_secret(),
            bob.onetime_secret(index).unwrap(),
            &alice.header.identity_key,
            &alice.header.ephemeral_key,
        )
        .unwrap();

        assert_eq!(alice.state.root_key, bob_state.root_key);

        // Chains are mirrored.
        assert_eq!(alice.state.send_chain_key, bob_state.receive_chain_key);
        assert_eq!(alice.state.receive_chain_key, bob_state.send_chain_key);
        assert_ne!(alice.state.send_chain_key, alice.state.receive_chain_key);

        // Initial ratchet keys.
        assert_eq!(alice.state.send_ratchet_key(), &alice.header.ephemeral_key);
        assert_eq!(bob_state.send_ratchet_key(), bob.identity_key());
        assert!(alice.state.receive_ratchet_key().is_none());
        assert!(bob_state.receive_ratchet_key().is_none());

        // Using the key manager directly leads to the same state.
        assert_eq!(x3dh_respond_with(&bob, &alice.header).unwrap(), bob_state);
    }

    #[rstest]
    fn fresh_ephemeral_keys(parties: Parties) {
        let Parties {
            rng,
            alice_identity_secret,
            bob,
        } = parties;
        let bundle = bob.published_bundle();

        let first = x3dh_initiate(&alice_identity_secret, &bundle, 0, &rng).unwrap();
        let second = x3dh_initiate(&alice_identity_secret, &bundle, 0, &rng).unwrap();
        assert_ne!(first.header.ephemeral_key, second.header.ephemeral_key);
        assert_ne!(first.state.root_key, second.state.root_key);
    }

    #[rstest]
    fn different_onetime_prekeys(parties: Parties) {
        let Parties {
            rng,
            alice_identity_secret,
            bob,
        } = parties;

        let alice = x3dh_initiate(&alice_identity_secret, &bob.published_bundle(), 0, &rng)
            .unwrap();

        // Bob picks the wrong one-time secret.
        let bob_state = x3dh_respond(
            bob.identity_secret(),
            bob.signed_prekey_secret(),
            bob.onetime_secret(1).unwrap(),
            &alice.header.identity_key,
            &alice.header.ephemeral_key,
        )
        .unwrap();
        assert_ne!(alice.state.root_key, bob_state.root_key);
    }

    #[rstest]
    fn invalid_index(parties: Parties) {
        let Parties {
            rng,
            alice_identity_secret,
            bob,
        } = parties;

        // No ephemeral key gets generated for a rejected index.
        let untouched_rng = Rng::from_seed([9; 32]);
        let used_rng = Rng::from_seed([9; 32]);
        let result = x3dh_initiate(
            &alice_identity_secret,
            &bob.published_bundle(),
            3,
            &used_rng,
        );
        assert!(matches!(result, Err(X3dhError::InvalidIndex(3))));
        assert_eq!(
            untouched_rng.random_array::<32>().unwrap(),
            used_rng.random_array::<32>().unwrap()
        );

        let result = x3dh_initiate(
            &alice_identity_secret,
            &bob.published_bundle(),
            u64::MAX,
            &rng,
        );
        assert!(matches!(result, Err(X3dhError::InvalidIndex(u64::MAX))));

        let alice = x3dh_initiate(&alice_identity_secret, &bob.published_bundle(), 0, &rng)
            .unwrap();
        let mut header = alice.header.clone();
        header.onetime_prekey_index = 7;
        assert!(matches!(
            x3dh_respond_with(&bob, &header),
            Err(X3dhError::InvalidIndex(7))
        ));
    }

    #[rstest]
    fn invalid_signature(parties: Parties) {
        let Parties {
            rng,
            alice_identity_secret,
            bob,
        } = parties;
        let bundle = bob.published_bundle();

        // Pre-key was signed by someone else.
        let mallory_secret = SecretKey::from_bytes(rng.random_array().unwrap());
        let forged = PreKeyBundle::new(
            *bundle.identity_key(),
            SignedPreKey::sign(*bundle.signed_prekey(), &mallory_secret, &rng).unwrap(),
            bundle.onetime_prekeys().to_vec(),
        );
        assert!(matches!(
            x3dh_initiate(&alice_identity_secret, &forged, 0, &rng),
            Err(X3dhError::InvalidSignature(_))
        ));

        // Signature over other bytes.
        let forged = PreKeyBundle::new(
            *bundle.identity_key(),
            SignedPreKey::new(
                *bundle.signed_prekey(),
                xeddsa_sign(b"something else", bob.identity_secret(), &rng).unwrap(),
            ),
            bundle.onetime_prekeys().to_vec(),
        );
        assert!(matches!(
            x3dh_initiate(&alice_identity_secret, &forged, 0, &rng),
            Err(X3dhError::InvalidSignature(_))
        ));
    }

    #[rstest]
    fn low_order_ephemeral_key(parties: Parties) {
        let Parties {
            alice_identity_secret,
            bob,
            ..
        } = parties;

        assert!(matches!(
            x3dh_respond(
                bob.identity_secret(),
                bob.signed_prekey_secret(),
                bob.onetime_secret(0).unwrap(),
                &alice_identity_secret.public_key(),
                &PublicKey::from_bytes([0; 32]),
            ),
            Err(X3dhError::KeyAgreementFailure(_))
        ));
    }
}
