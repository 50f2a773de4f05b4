//! Fixed 64-byte container header

use vmcrypt_core::{CryptoError, CryptoResult};

use crate::secret::fill_random;

pub const HEADER_MAGIC: [u8; 32] = *b"\x7fVirtualBox Encrypted File\n\0\0\0\0\0";
pub const HEADER_VERSION: u32 = 0x0001_0000;
pub const HEADER_SIZE: usize = 64;

/// Largest chunk width accepted from a header.
pub const MAX_UNIT_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Encrypted bytes per chunk.
    pub unit_size: u32,
    pub reserved: u64,
    /// Per-file random bytes. They make the padding split differ between
    /// files encrypted under the same DEK.
    pub salt: [u8; 16],
}

impl FileHeader {
    pub fn new(unit_size: u32) -> Self {
        let mut salt = [0u8; 16];
        fill_random(&mut salt);
        Self {
            unit_size,
            reserved: 0,
            salt,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut raw = [0u8; HEADER_SIZE];
        raw[..32].copy_from_slice(&HEADER_MAGIC);
        raw[32..36].copy_from_slice(&HEADER_VERSION.to_le_bytes());
        raw[36..40].copy_from_slice(&self.unit_size.to_le_bytes());
        raw[40..48].copy_from_slice(&self.reserved.to_le_bytes());
        raw[48..64].copy_from_slice(&self.salt);
        raw
    }

    pub fn parse(raw: &[u8]) -> CryptoResult<Self> {
        if raw.len() < HEADER_SIZE {
            return Err(CryptoError::Format(format!(
                "container header truncated to {} bytes",
                raw.len()
            )));
        }
        if raw[..32] != HEADER_MAGIC {
            return Err(CryptoError::InvalidMagic);
        }

        let mut word = [0u8; 4];
        word.copy_from_slice(&raw[32..36]);
        let version = u32::from_le_bytes(word);
        if version != HEADER_VERSION {
            return Err(CryptoError::UnsupportedVersion(version));
        }

        word.copy_from_slice(&raw[36..40]);
        let unit_size = u32::from_le_bytes(word);
        if unit_size == 0 || unit_size as usize > MAX_UNIT_SIZE {
            return Err(CryptoError::Format(format!(
                "chunk width {unit_size} out of range"
            )));
        }

        let mut quad = [0u8; 8];
        quad.copy_from_slice(&raw[40..48]);
        let mut salt = [0u8; 16];
        salt.copy_from_slice(&raw[48..64]);

        Ok(Self {
            unit_size,
            reserved: u64::from_le_bytes(quad),
            salt,
        })
    }
}
