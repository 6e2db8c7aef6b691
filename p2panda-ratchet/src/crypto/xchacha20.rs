// SPDX-License-Identifier: MIT OR Apache-2.0

//! XChaCha20Poly1305 is a ChaCha20Poly1305 AEAD variant with an extended 192-bit (24-byte) nonce.
//!
//! The large nonce space allows us to pick a fresh random nonce for every encryption without
//! having to coordinate counters between peers.
use chacha20poly1305::{AeadInPlace, Key, KeyInit, XChaCha20Poly1305, XNonce};
use thiserror::Error;

/// 192-bit nonce size.
pub const X_AEAD_NONCE_SIZE: usize = 24;

/// 256-bit key size.
pub const X_AEAD_KEY_SIZE: usize = 32;

/// 128-bit authentication tag size, appended to every ciphertext.
pub const X_AEAD_TAG_SIZE: usize = 16;

pub type XAeadNonce = [u8; X_AEAD_NONCE_SIZE];

pub type XAeadKey = [u8; X_AEAD_KEY_SIZE];

pub fn x_aead_encrypt(
    key: &XAeadKey,
    plaintext: &[u8],
    nonce: XAeadNonce,
    aad: Option<&[u8]>,
) -> Result<Vec<u8>, XAeadError> {
    let key = Key::from_slice(key);
    let nonce = XNonce::from_slice(&nonce);
    let mut ciphertext: Vec<u8> = Vec::with_capacity(plaintext.len() + X_AEAD_TAG_SIZE);
    ciphertext.extend_from_slice(plaintext);

    let cipher = XChaCha20Poly1305::new(key);
    cipher
        .encrypt_in_place(nonce, aad.unwrap_or_default(), &mut ciphertext)
        .map_err(XAeadError::Encrypt)?;

    Ok(ciphertext)
}

pub fn x_aead_decrypt(
    key: &XAeadKey,
    ciphertext_tag: &[u8],
    nonce: XAeadNonce,
    aad: Option<&[u8]>,
) -> Result<Vec<u8>, XAeadError> {
    let key = Key::from_slice(key);
    let nonce = XNonce::from_slice(&nonce);
    let mut plaintext: Vec<u8> = Vec::from(ciphertext_tag);

    let cipher = XChaCha20Poly1305::new(key);
    cipher
        .decrypt_in_place(nonce, aad.unwrap_or_default(), &mut plaintext)
        .map_err(XAeadError::Decrypt)?;

    Ok(plaintext)
}

#[derive(Debug, Error)]
pub enum XAeadError {
    #[error("could not encrypt with xchacha20poly1305 aead: {0}")]
    Encrypt(chacha20poly1305::Error),

    #[error("could not decrypt with xchacha20poly1305 aead: {0}")]
    Decrypt(chacha20poly1305::Error),
}

#[cfg(test)]
mod tests {
    use crate::crypto::Rng;

    use super::{X_AEAD_TAG_SIZE, XAeadError, XAeadKey, XAeadNonce, x_aead_decrypt, x_aead_encrypt};

    #[test]
    fn encrypt_decrypt() {
        let rng = Rng::from_seed([1; 32]);

        let key: XAeadKey = rng.random_array().unwrap();
        let nonce: XAeadNonce = rng.random_array().unwrap();

        let ciphertext = x_aead_encrypt(&key, b"Hello, Panda!", nonce, Some(b"aad")).unwrap();
        assert_eq!(ciphertext.len(), b"Hello, Panda!".len() + X_AEAD_TAG_SIZE);

        let plaintext = x_aead_decrypt(&key, &ciphertext, nonce, Some(b"aad")).unwrap();
        assert_eq!(plaintext, b"Hello, Panda!");
    }

    #[test]
    fn decryption_failed() {
        let rng = Rng::from_seed([1; 32]);

        let key: XAeadKey = rng.random_array().unwrap();
        let nonce: XAeadNonce = rng.random_array().unwrap();

        let ciphertext = x_aead_encrypt(&key, b"Hello, Panda!", nonce, Some(b"aad")).unwrap();

        // Wrong key.
        let invalid_key: XAeadKey = rng.random_array().unwrap();
        assert!(matches!(
            x_aead_decrypt(&invalid_key, &ciphertext, nonce, Some(b"aad")),
            Err(XAeadError::Decrypt(_))
        ));

        // Wrong associated data.
        assert!(matches!(
            x_aead_decrypt(&key, &ciphertext, nonce, Some(b"other aad")),
            Err(XAeadError::Decrypt(_))
        ));

        // Wrong nonce.
        let invalid_nonce: XAeadNonce = rng.random_array().unwrap();
        assert!(matches!(
            x_aead_decrypt(&key, &ciphertext, invalid_nonce, Some(b"aad")),
            Err(XAeadError::Decrypt(_))
        ));

        // Ciphertext shorter than the tag.
        assert!(matches!(
            x_aead_decrypt(&key, &ciphertext[..4], nonce, Some(b"aad")),
            Err(XAeadError::Decrypt(_))
        ));
    }
}
