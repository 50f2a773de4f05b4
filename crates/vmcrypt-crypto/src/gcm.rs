//! AES-GCM engine
//!
//! Message format:
//! ```text
//! [12 bytes: nonce][16 bytes: GCM tag][N bytes: ciphertext]
//! ```
//!
//! The tag precedes the ciphertext so a reader can authenticate a chunk
//! without knowing its length in advance.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use vmcrypt_core::{CryptoError, CryptoResult};

use crate::cipher::{CipherMode, GCM_IV_SIZE, GCM_TAG_SIZE};
use crate::engine::{resolve_iv, too_short, CipherEngine};

#[derive(Debug)]
pub struct GcmEngine;

enum AesGcm {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl AesGcm {
    fn new(key: &[u8]) -> CryptoResult<Self> {
        let invalid = |e: aes::cipher::InvalidLength| {
            CryptoError::InvalidArgument(format!("AES-GCM key: {e}"))
        };
        match key.len() {
            16 => Aes128Gcm::new_from_slice(key)
                .map(|c| Self::Aes128(Box::new(c)))
                .map_err(invalid),
            32 => Aes256Gcm::new_from_slice(key)
                .map(|c| Self::Aes256(Box::new(c)))
                .map_err(invalid),
            n => Err(CryptoError::InvalidArgument(format!(
                "AES-GCM key must be 16 or 32 bytes, got {n}"
            ))),
        }
    }

    fn encrypt(&self, nonce: &[u8], payload: Payload<'_, '_>) -> Result<Vec<u8>, aes_gcm::Error> {
        let nonce = Nonce::from_slice(nonce);
        match self {
            Self::Aes128(c) => c.encrypt(nonce, payload),
            Self::Aes256(c) => c.encrypt(nonce, payload),
        }
    }

    fn decrypt(&self, nonce: &[u8], payload: Payload<'_, '_>) -> Result<Vec<u8>, aes_gcm::Error> {
        let nonce = Nonce::from_slice(nonce);
        match self {
            Self::Aes128(c) => c.decrypt(nonce, payload),
            Self::Aes256(c) => c.decrypt(nonce, payload),
        }
    }
}

impl CipherEngine for GcmEngine {
    fn mode(&self) -> CipherMode {
        CipherMode::Gcm
    }

    fn encrypt(
        &self,
        key: &[u8],
        iv: Option<&[u8]>,
        plaintext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let iv = resolve_iv(GCM_IV_SIZE, iv)?;
        let cipher = AesGcm::new(key)?;

        // aes-gcm appends the tag; move it in front of the ciphertext.
        let sealed = cipher
            .encrypt(&iv, Payload { msg: plaintext, aad })
            .map_err(|e| CryptoError::InvalidOperation(format!("AES-GCM encryption failed: {e}")))?;
        let (ciphertext, tag) = sealed.split_at(sealed.len() - GCM_TAG_SIZE);

        let mut out = Vec::new();
        out.try_reserve_exact(GCM_IV_SIZE + sealed.len())?;
        out.extend_from_slice(&iv);
        out.extend_from_slice(tag);
        out.extend_from_slice(ciphertext);
        Ok(out)
    }

    fn decrypt(&self, key: &[u8], message: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        let overhead = CipherMode::Gcm.overhead();
        if message.len() < overhead {
            return Err(too_short(message.len(), overhead));
        }
        let (iv, rest) = message.split_at(GCM_IV_SIZE);
        let (tag, ciphertext) = rest.split_at(GCM_TAG_SIZE);
        let cipher = AesGcm::new(key)?;

        let mut sealed = Vec::new();
        sealed.try_reserve_exact(rest.len())?;
        sealed.extend_from_slice(ciphertext);
        sealed.extend_from_slice(tag);

        cipher
            .decrypt(iv, Payload { msg: &sealed, aad })
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}
