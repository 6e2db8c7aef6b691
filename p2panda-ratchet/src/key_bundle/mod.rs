// SPDX-License-Identifier: MIT OR Apache-2.0

//! Public key material a party publishes so others can establish sessions with them while they
//! are offline.
#[allow(clippy::module_inception)]
mod key_bundle;
mod prekey;

pub use key_bundle::{KeyBundleError, PreKeyBundle};
pub use prekey::{OneTimePreKeyIndex, SignedPreKey};
