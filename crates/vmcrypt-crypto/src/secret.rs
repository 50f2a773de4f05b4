//! Zeroizing key buffers

use rand::RngCore;
use vmcrypt_core::CryptoResult;
use zeroize::Zeroize;

/// Owned key material (DEKs, derived wrapping keys). Zeroized on drop.
///
/// Deliberately not `Clone`: a key has exactly one owner. Crate code that
/// needs a second copy (e.g. a keystream holding its own key) goes through
/// [`SecretBytes::try_duplicate`].
pub struct SecretBytes {
    bytes: Vec<u8>,
}

impl SecretBytes {
    /// Allocate a zero-filled buffer, reporting allocation failure as `NoMemory`.
    pub fn zeroed(len: usize) -> CryptoResult<Self> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(len)?;
        bytes.resize(len, 0);
        Ok(Self { bytes })
    }

    /// Allocate a buffer filled from the thread-local CSPRNG.
    pub fn random(len: usize) -> CryptoResult<Self> {
        let mut secret = Self::zeroed(len)?;
        rand::thread_rng().fill_bytes(&mut secret.bytes);
        Ok(secret)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let mut secret = Self::zeroed(bytes.len())?;
        secret.bytes.copy_from_slice(bytes);
        Ok(secret)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn try_duplicate(&self) -> CryptoResult<Self> {
        Self::from_slice(&self.bytes)
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBytes")
            .field("len", &self.bytes.len())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Fill `buf` from the thread-local CSPRNG.
pub(crate) fn fill_random(buf: &mut [u8]) {
    rand::thread_rng().fill_bytes(buf);
}
