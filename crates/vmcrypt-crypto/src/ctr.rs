//! AES-CTR engine (128-bit big-endian counter)
//!
//! Message format is `[16 bytes: initial counter block][N bytes: ciphertext]`.
//! There is no tag, so associated data is ignored and tampering is not
//! detected at this layer.

use aes::{Aes128, Aes256};
use ctr::cipher::{InvalidLength, KeyIvInit, StreamCipher};
use vmcrypt_core::{CryptoError, CryptoResult};

use crate::cipher::{CipherMode, CTR_IV_SIZE};
use crate::engine::{resolve_iv, too_short, CipherEngine, Keystream};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;

#[derive(Debug)]
pub struct CtrEngine;

enum AesCtr {
    Aes128(Aes128Ctr),
    Aes256(Aes256Ctr),
}

impl AesCtr {
    fn new(key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        let invalid = |e: InvalidLength| CryptoError::InvalidArgument(format!("AES-CTR key/IV: {e}"));
        match key.len() {
            16 => Aes128Ctr::new_from_slices(key, iv).map(Self::Aes128).map_err(invalid),
            32 => Aes256Ctr::new_from_slices(key, iv).map(Self::Aes256).map_err(invalid),
            n => Err(CryptoError::InvalidArgument(format!(
                "AES-CTR key must be 16 or 32 bytes, got {n}"
            ))),
        }
    }
}

impl Keystream for AesCtr {
    fn apply(&mut self, data: &mut [u8]) {
        match self {
            Self::Aes128(c) => c.apply_keystream(data),
            Self::Aes256(c) => c.apply_keystream(data),
        }
    }
}

impl CipherEngine for CtrEngine {
    fn mode(&self) -> CipherMode {
        CipherMode::Ctr
    }

    fn encrypt(
        &self,
        key: &[u8],
        iv: Option<&[u8]>,
        plaintext: &[u8],
        _aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let iv = resolve_iv(CTR_IV_SIZE, iv)?;
        let mut stream = AesCtr::new(key, &iv)?;

        let mut out = Vec::new();
        out.try_reserve_exact(CTR_IV_SIZE + plaintext.len())?;
        out.extend_from_slice(&iv);
        out.extend_from_slice(plaintext);
        stream.apply(&mut out[CTR_IV_SIZE..]);
        Ok(out)
    }

    fn decrypt(&self, key: &[u8], message: &[u8], _aad: &[u8]) -> CryptoResult<Vec<u8>> {
        if message.len() < CTR_IV_SIZE {
            return Err(too_short(message.len(), CTR_IV_SIZE));
        }
        let (iv, ciphertext) = message.split_at(CTR_IV_SIZE);
        let mut stream = AesCtr::new(key, iv)?;

        let mut out = Vec::new();
        out.try_reserve_exact(ciphertext.len())?;
        out.extend_from_slice(ciphertext);
        stream.apply(&mut out);
        Ok(out)
    }

    fn keystream(&self, key: &[u8], iv: &[u8]) -> CryptoResult<Box<dyn Keystream>> {
        if iv.len() != CTR_IV_SIZE {
            return Err(CryptoError::InvalidArgument(format!(
                "IV must be {CTR_IV_SIZE} bytes, got {}",
                iv.len()
            )));
        }
        Ok(Box::new(AesCtr::new(key, iv)?))
    }
}
