//! The tree engine's node-encryption wrapper.
//!
//! Nodes are encrypted with AES-256-GCM: a 96-bit nonce and a 128-bit
//! authentication tag. Because a node's on-wire digest is taken over its
//! *ciphertext*, the nonce cannot be derived from anything only knowable
//! after encryption (the stored digest itself) without making decryption
//! circular. Instead the nonce is derived from `SHA-256(key || plaintext)`
//! and stored as a 12-byte prefix ahead of the AEAD ciphertext, so a reader
//! recovers it before attempting to decrypt. Re-encrypting identical
//! plaintext under the same key therefore always reproduces the same
//! prefix, the same ciphertext, and so the same digest — convergent
//! deduplication within one key domain, at the cost of revealing duplicate
//! content to anyone who can observe repeated stored blocks under that key.
//! That tradeoff is accepted deliberately; see `DESIGN.md`.
//!
//! This wrapper lives inside the tree engine, below the codec: callers never
//! see ciphertext, only plaintext node bytes in and out.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use tree_core::{Error, Key, Result};

const NONCE_LEN: usize = 12;

fn derive_nonce(key: &Key, plaintext: &[u8]) -> [u8; NONCE_LEN] {
    use sha2::{Digest as _, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(key.0);
    hasher.update(plaintext);
    let out = hasher.finalize();
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&out[..NONCE_LEN]);
    nonce
}

/// Encrypt `plaintext` for storage under `key`.
///
/// Returns `nonce || ciphertext` (ciphertext carries the 128-bit AEAD tag),
/// ready to be written to the block store as-is: its digest is computed
/// over exactly these bytes.
pub fn encrypt(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|e| Error::Crypto(e.to_string()))?;
    let nonce_bytes = derive_nonce(key, plaintext);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher.encrypt(nonce, plaintext).map_err(|_| Error::Crypto("encrypt failed".into()))?;
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt bytes previously produced by [`encrypt`] for the same `key`.
/// Fails closed: a missing nonce prefix, a wrong key, or a tampered
/// ciphertext returns an error rather than partial or garbage plaintext.
pub fn decrypt(key: &Key, stored: &[u8]) -> Result<Vec<u8>> {
    if stored.len() < NONCE_LEN {
        return Err(Error::Crypto("stored bytes shorter than nonce prefix".into()));
    }
    let (nonce_bytes, ciphertext) = stored.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(&key.0).map_err(|e| Error::Crypto(e.to_string()))?;
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher.decrypt(nonce, ciphertext).map_err(|_| Error::Crypto("decrypt/authenticate failed".into()))
}
