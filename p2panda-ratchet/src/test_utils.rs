// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for tests and fuzzing.
use crate::crypto::Rng;
use crate::key_manager::{KeyManager, KeyManagerConfig};
use crate::session::Session;

/// Prints `tracing` output when the `RUST_LOG` environment variable is set.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Two parties with an established session, Alice initiated it.
pub struct Members {
    pub alice: KeyManager,
    pub bob: KeyManager,
    pub alice_session: Session,
    pub bob_session: Session,
}

/// Sets up key managers for Alice and Bob and establishes a session using Bob's first one-time
/// pre-key.
pub fn establish_session(rng: &Rng) -> Members {
    let config = KeyManagerConfig { onetime_prekeys: 1 };
    let alice = KeyManager::new(&config, rng).expect("alice key manager");
    let bob = KeyManager::new(&config, rng).expect("bob key manager");

    let (alice_session, header) =
        Session::initiate(alice.identity_secret(), &bob.published_bundle(), 0, rng)
            .expect("initiate session");
    let bob_session = Session::respond(&bob, &header).expect("respond to session");

    Members {
        alice,
        bob,
        alice_session,
        bob_session,
    }
}
