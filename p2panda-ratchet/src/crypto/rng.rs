// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Mutex;

use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::{SeedableRng, TryRngCore};
use thiserror::Error;

/// Cryptographically-secure random number generator that uses the ChaCha algorithm.
///
/// Every ephemeral key pair and every AEAD nonce is drawn from this source. Instances are created
/// and owned by the caller, there is no process-wide generator.
#[derive(Debug)]
pub struct Rng(Mutex<ChaCha20Rng>);

impl Default for Rng {
    fn default() -> Self {
        Self(Mutex::new(ChaCha20Rng::from_os_rng()))
    }
}

impl Rng {
    /// Deterministic generator for tests. Never use this for real key material.
    #[cfg(any(test, feature = "test_utils"))]
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self(Mutex::new(ChaCha20Rng::from_seed(seed)))
    }

    pub fn random_array<const N: usize>(&self) -> Result<[u8; N], RngError> {
        let mut out = [0u8; N];
        self.fill(&mut out)?;
        Ok(out)
    }

    pub fn random_vec(&self, len: usize) -> Result<Vec<u8>, RngError> {
        let mut out = vec![0u8; len];
        self.fill(&mut out)?;
        Ok(out)
    }

    fn fill(&self, out: &mut [u8]) -> Result<(), RngError> {
        self.0
            .lock()
            .map_err(|_| RngError::LockPoisoned)?
            .try_fill_bytes(out)
            .map_err(|_| RngError::NotEnoughRandomness)
    }
}

#[derive(Debug, Error)]
pub enum RngError {
    #[error("rng lock is poisoned")]
    LockPoisoned,

    #[error("unable to collect enough randomness")]
    NotEnoughRandomness,
}
