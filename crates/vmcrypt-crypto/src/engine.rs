//! Cipher engines: one implementation per mode, selected from the registry

use vmcrypt_core::{CryptoError, CryptoResult};

use crate::cipher::{CipherDescriptor, CipherMode};
use crate::ctr::CtrEngine;
use crate::gcm::GcmEngine;
use crate::secret::{fill_random, SecretBytes};

/// Whole-message encryption for one cipher mode.
///
/// Engines are stateless; the key is supplied on every call and has already
/// been checked against the descriptor's key size.
pub trait CipherEngine: Send + Sync + std::fmt::Debug {
    fn mode(&self) -> CipherMode;

    /// Encrypt `plaintext`. A missing `iv` is generated randomly.
    ///
    /// Output layout is `<IV><TAG><ciphertext>` with empty parts omitted.
    fn encrypt(
        &self,
        key: &[u8],
        iv: Option<&[u8]>,
        plaintext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>>;

    /// Decrypt a message produced by [`CipherEngine::encrypt`].
    fn decrypt(&self, key: &[u8], message: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Start a keystream for partial (streaming) operation.
    fn keystream(&self, _key: &[u8], _iv: &[u8]) -> CryptoResult<Box<dyn Keystream>> {
        Err(CryptoError::InvalidOperation(format!(
            "{:?} mode does not support partial operation",
            self.mode()
        )))
    }
}

/// Running keystream state. Encryption and decryption are the same transform.
pub trait Keystream: Send {
    fn apply(&mut self, data: &mut [u8]);
}

/// Build the engine for a registered cipher.
pub fn engine_for(descriptor: &CipherDescriptor) -> Box<dyn CipherEngine> {
    match descriptor.mode {
        CipherMode::Xor => Box::new(XorEngine),
        CipherMode::Gcm => Box::new(GcmEngine),
        CipherMode::Ctr => Box::new(CtrEngine),
    }
}

/// Use the caller's IV (which must be exactly `size` bytes) or draw a random one.
pub(crate) fn resolve_iv(size: usize, iv: Option<&[u8]>) -> CryptoResult<Vec<u8>> {
    match iv {
        Some(iv) if iv.len() == size => Ok(iv.to_vec()),
        Some(iv) => Err(CryptoError::InvalidArgument(format!(
            "IV must be {size} bytes, got {}",
            iv.len()
        ))),
        None => {
            let mut fresh = vec![0u8; size];
            fill_random(&mut fresh);
            Ok(fresh)
        }
    }
}

pub(crate) fn too_short(len: usize, overhead: usize) -> CryptoError {
    CryptoError::Format(format!(
        "message of {len} bytes is shorter than the {overhead}-byte cipher overhead"
    ))
}

/// Repeating-key XOR. Test and diagnostic use only.
#[derive(Debug)]
pub struct XorEngine;

fn xor_at(key: &[u8], offset: usize, data: &mut [u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[(offset + i) % key.len()];
    }
}

impl CipherEngine for XorEngine {
    fn mode(&self) -> CipherMode {
        CipherMode::Xor
    }

    fn encrypt(
        &self,
        key: &[u8],
        iv: Option<&[u8]>,
        plaintext: &[u8],
        _aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        if key.is_empty() {
            return Err(CryptoError::InvalidArgument("XOR key must not be empty".into()));
        }
        resolve_iv(0, iv)?;
        let mut out = Vec::new();
        out.try_reserve_exact(plaintext.len())?;
        out.extend_from_slice(plaintext);
        xor_at(key, 0, &mut out);
        Ok(out)
    }

    fn decrypt(&self, key: &[u8], message: &[u8], _aad: &[u8]) -> CryptoResult<Vec<u8>> {
        self.encrypt(key, None, message, &[])
    }

    fn keystream(&self, key: &[u8], iv: &[u8]) -> CryptoResult<Box<dyn Keystream>> {
        if key.is_empty() {
            return Err(CryptoError::InvalidArgument("XOR key must not be empty".into()));
        }
        resolve_iv(0, Some(iv))?;
        Ok(Box::new(XorStream {
            key: SecretBytes::from_slice(key)?,
            offset: 0,
        }))
    }
}

struct XorStream {
    key: SecretBytes,
    offset: usize,
}

impl Keystream for XorStream {
    fn apply(&mut self, data: &mut [u8]) {
        xor_at(self.key.as_bytes(), self.offset, data);
        self.offset = (self.offset + data.len()) % self.key.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher;

    #[test]
    fn test_engine_selection() {
        for descriptor in cipher::all() {
            assert_eq!(engine_for(descriptor).mode(), descriptor.mode);
        }
    }

    #[test]
    fn test_xor_is_involution() {
        let key = [0x0fu8; 16];
        let ct = XorEngine.encrypt(&key, None, b"hello world", &[]).unwrap();
        assert_eq!(ct.len(), 11);
        assert_ne!(&ct[..], b"hello world");
        assert_eq!(XorEngine.decrypt(&key, &ct, &[]).unwrap(), b"hello world");
    }

    #[test]
    fn test_xor_stream_matches_one_shot() {
        let key: Vec<u8> = (1..=16).collect();
        let data: Vec<u8> = (0..100).collect();
        let one_shot = XorEngine.encrypt(&key, None, &data, &[]).unwrap();

        let mut stream = XorEngine.keystream(&key, &[]).unwrap();
        let mut pieces = data.clone();
        let (a, rest) = pieces.split_at_mut(7);
        let (b, c) = rest.split_at_mut(40);
        stream.apply(a);
        stream.apply(b);
        stream.apply(c);
        assert_eq!(pieces, one_shot);
    }

    #[test]
    fn test_xor_rejects_iv() {
        assert!(XorEngine.encrypt(&[1u8; 16], Some(&[0u8; 12]), b"x", &[]).is_err());
    }

    #[test]
    fn test_resolve_iv() {
        assert_eq!(resolve_iv(12, Some(&[7u8; 12])).unwrap(), vec![7u8; 12]);
        assert_eq!(resolve_iv(16, None).unwrap().len(), 16);
        assert!(matches!(
            resolve_iv(16, Some(&[0u8; 12])),
            Err(CryptoError::InvalidArgument(_))
        ));
    }
}
