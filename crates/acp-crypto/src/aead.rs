//! AES-256-GCM authenticated encryption for session payload wrapping
//! (spec §4.2 "Supporting" bullet). Wire layout is `iv (12 bytes) ||
//! ciphertext || tag (16 bytes)`, matching what `acp-session` expects to
//! find on the wire.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand_core::RngCore;

use crate::error::CryptoError;

const IV_LEN: usize = 12;

/// Encrypt `plaintext` under `key` (32 bytes), optionally binding `aad`.
/// Returns `iv || ciphertext || tag`.
pub fn aes_gcm_encrypt(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut iv = [0u8; IV_LEN];
    rand_core::OsRng.fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|e| CryptoError::Aead(e.to_string()))?;

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a buffer produced by [`aes_gcm_encrypt`].
pub fn aes_gcm_decrypt(key: &[u8; 32], wire: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if wire.len() < IV_LEN {
        return Err(CryptoError::Aead("ciphertext shorter than iv".to_string()));
    }
    let (iv, ciphertext) = wire.split_at(IV_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(iv);

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|e| CryptoError::Aead(e.to_string()))
}
