// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic primitives required for session establishment and the message ratchet.
pub mod hkdf;
mod rng;
mod secret;
pub mod sha2;
pub mod x25519;
pub mod xchacha20;
pub mod xeddsa;

pub use rng::{Rng, RngError};
pub(crate) use secret::Secret;
