// SPDX-License-Identifier: MIT OR Apache-2.0

//! `p2panda-ratchet` provides end-to-end encrypted channels between two parties which are not
//! necessarily online at the same time.
//!
//! Sessions are established with Signal's [X3DH](https://signal.org/docs/specifications/x3dh)
//! key-agreement: a party publishes a [`PreKeyBundle`] containing its identity key, a signed
//! pre-key and a list of one-time pre-keys. Anyone holding that bundle can derive a shared root
//! key and start sending encrypted messages right away, the owner of the bundle derives the same
//! root key as soon as it receives the [`X3dhHeader`] of the initiating party.
//!
//! The pre-key is signed with the identity key using
//! [XEdDSA](https://signal.org/docs/specifications/xeddsa), which allows us to use a single X25519
//! key pair per identity for both key agreement and signatures.
//!
//! ## Message ratchet
//!
//! Each message introduces a fresh ratchet key pair. The Diffie-Hellman secret between it and the
//! latest ratchet key of the other party advances the shared root key, from which a single-use
//! message key is derived. Messages are encrypted with XChaCha20-Poly1305 using a random nonce
//! and the sender's ratchet public key as associated data.
//!
//! Since both parties advance one shared root chain, messages need to be processed in one global
//! order: a party only sends after it processed every message of the other party. Messages which
//! were lost, crossed each other or arrive out-of-order fail authentication. Delivering them in
//! order is up to the transport.
//!
//! ## Usage
//!
//! Most applications will want to use the high-level [`Session`] which keeps track of all ratchet
//! keys. The building blocks ([`x3dh_initiate`], [`x3dh_respond`] and [`Ratchet`]) are exposed
//! for custom integrations.
//!
//! ## Security
//!
//! Encryption helps to prevent your data being readable by third parties but it can never
//! guarantee full security. Persisting key material, tracking which one-time pre-keys were used
//! and authenticating the identity keys of other parties is the responsibility of the
//! application.
mod bytes;
pub mod cbor;
pub mod crypto;
mod key_bundle;
mod key_manager;
mod ratchet;
mod session;
mod session_state;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod x3dh;

pub use bytes::SerializationError;
pub use crypto::{Rng, RngError};
pub use key_bundle::{KeyBundleError, OneTimePreKeyIndex, PreKeyBundle, SignedPreKey};
pub use key_manager::{DEFAULT_ONETIME_PREKEYS, KeyManager, KeyManagerConfig, KeyManagerError};
pub use ratchet::{Ratchet, RatchetError, RatchetMessage};
pub use session::{Session, SessionError};
pub use session_state::SessionState;
pub use x3dh::{
    X3dhError, X3dhHeader, X3dhInitiated, x3dh_initiate, x3dh_respond, x3dh_respond_with,
};
