// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

use crate::bytes::{ByteReader, SerializationError};
use crate::crypto::Secret;
use crate::crypto::x25519::{PUBLIC_KEY_SIZE, PublicKey};

/// Size of root-, chain- and message keys.
pub const KEY_SIZE: usize = 32;

/// Size of a serialized state without a receive ratchet key.
const MIN_STATE_SIZE: usize = KEY_SIZE * 3 + PUBLIC_KEY_SIZE + 1;

pub(crate) type RootKey = Secret<KEY_SIZE>;

pub(crate) type ChainKey = Secret<KEY_SIZE>;

/// Ratchet state of one party in an established session.
///
/// Created by the X3DH key agreement and afterwards only mutated by the ratchet. The root key and
/// chain keys never leave the crate other than through the serialized form, which is meant for
/// persisting a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub(crate) root_key: RootKey,
    pub(crate) send_chain_key: ChainKey,
    pub(crate) receive_chain_key: ChainKey,
    pub(crate) send_ratchet_key: PublicKey,
    pub(crate) receive_ratchet_key: Option<PublicKey>,
}

impl SessionState {
    /// Our latest ratchet public key.
    pub fn send_ratchet_key(&self) -> &PublicKey {
        &self.send_ratchet_key
    }

    /// Latest ratchet public key of the other party, `None` until we received a message.
    pub fn receive_ratchet_key(&self) -> Option<&PublicKey> {
        self.receive_ratchet_key.as_ref()
    }

    /// Encodes the state as `root ‖ send chain ‖ receive chain ‖ send ratchet key ‖ flag` followed
    /// by the receive ratchet key if the flag is set.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MIN_STATE_SIZE + PUBLIC_KEY_SIZE);
        buf.extend_from_slice(self.root_key.as_bytes());
        buf.extend_from_slice(self.send_chain_key.as_bytes());
        buf.extend_from_slice(self.receive_chain_key.as_bytes());
        buf.extend_from_slice(self.send_ratchet_key.as_bytes());
        match &self.receive_ratchet_key {
            Some(key) => {
                buf.push(1);
                buf.extend_from_slice(key.as_bytes());
            }
            None => buf.push(0),
        }
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        let mut reader = ByteReader::new(bytes);

        let root_key = Secret::from_bytes(reader.read_array()?);
        let send_chain_key = Secret::from_bytes(reader.read_array()?);
        let receive_chain_key = Secret::from_bytes(reader.read_array()?);
        let send_ratchet_key = PublicKey::from_bytes(reader.read_array()?);
        let receive_ratchet_key = match reader.read_u8()? {
            0 => None,
            1 => Some(PublicKey::from_bytes(reader.read_array()?)),
            flag => return Err(SerializationError::InvalidFlag(flag)),
        };
        reader.finish()?;

        Ok(Self {
            root_key,
            send_chain_key,
            receive_chain_key,
            send_ratchet_key,
            receive_ratchet_key,
        })
    }
}
