//! AES-256-GCM bulk encryption.
//!
//! The stored/transmitted form of an encrypted file is `nonce || ciphertext`,
//! where the ciphertext carries the 16-byte GCM tag at its end. [`seal`] and
//! [`open`] produce and consume that layout; [`encrypt`] and [`decrypt`] work
//! on the split parts.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::{SealError, SealResult};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// A 256-bit AES key, zeroed on drop.
pub struct SymmetricKey(Zeroizing<[u8; KEY_LEN]>);

impl SymmetricKey {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        rand::rngs::OsRng.fill_bytes(key.as_mut());
        SymmetricKey(key)
    }

    pub fn from_slice(bytes: &[u8]) -> SealResult<Self> {
        if bytes.len() != KEY_LEN {
            return Err(SealError::Validation(format!(
                "symmetric key must be {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(SymmetricKey(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(self.0.as_ref()))
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Encrypt `plaintext` under `key` with a fresh random 96-bit nonce.
///
/// Returns `(nonce, ciphertext_with_tag)`. A nonce is never reused: each call
/// draws a new one from the OS RNG.
pub fn encrypt(plaintext: &[u8], key: &SymmetricKey) -> SealResult<([u8; NONCE_LEN], Vec<u8>)> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| SealError::Validation("plaintext too large for AES-GCM".into()))?;

    Ok((nonce, ciphertext))
}

/// Decrypt and authenticate. Any tag mismatch yields
/// [`SealError::AuthenticationFailed`] and no plaintext at all.
pub fn decrypt(
    nonce: &[u8; NONCE_LEN],
    ciphertext_with_tag: &[u8],
    key: &SymmetricKey,
) -> SealResult<Vec<u8>> {
    key.cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext_with_tag)
        .map_err(|_| SealError::AuthenticationFailed)
}

/// Encrypt and concatenate into the `nonce || ciphertext_with_tag` envelope.
pub fn seal(plaintext: &[u8], key: &SymmetricKey) -> SealResult<Vec<u8>> {
    let (nonce, ciphertext) = encrypt(plaintext, key)?;
    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Split a `nonce || ciphertext_with_tag` envelope and decrypt it.
///
/// An envelope too short to hold a nonce and a tag is reported as an
/// authentication failure, the same as any other undecryptable input.
pub fn open(envelope: &[u8], key: &SymmetricKey) -> SealResult<Vec<u8>> {
    if envelope.len() < NONCE_LEN + TAG_LEN {
        return Err(SealError::AuthenticationFailed);
    }
    let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);
    let nonce: [u8; NONCE_LEN] = nonce
        .try_into()
        .map_err(|_| SealError::AuthenticationFailed)?;
    decrypt(&nonce, ciphertext, key)
}
