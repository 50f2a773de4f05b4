//! DEK wrapping with XTS-AES under a fixed all-zero tweak

use aes::cipher::consts::U16;
use aes::cipher::{BlockCipher, BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use aes::{Aes128, Aes256};
use vmcrypt_core::{CryptoError, CryptoResult};
use xts_mode::{get_tweak_default, Xts128};

/// Wide-block cipher used to wrap a DEK, implied by the DEK's cipher class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapCipher {
    /// XTS with two AES-128 keys (32-byte wrapping key)
    XtsAes128,
    /// XTS with two AES-256 keys (64-byte wrapping key)
    XtsAes256,
}

impl WrapCipher {
    /// Select the wrapping cipher for a DEK cipher name.
    ///
    /// Besides the registry ciphers this recognises the disk-image XTS names,
    /// whose key-stores share the same envelope.
    pub fn for_cipher(name: &str) -> CryptoResult<Self> {
        match name {
            "XOR" | "AES-GCM128" | "AES-CTR128" | "AES-XTS128-PLAIN64" => Ok(Self::XtsAes128),
            "AES-GCM256" | "AES-CTR256" | "AES-XTS256-PLAIN64" => Ok(Self::XtsAes256),
            other => Err(CryptoError::UnsupportedCipher(other.to_string())),
        }
    }

    /// Length of the wrapping key derived from the password.
    pub fn key_size(self) -> usize {
        match self {
            Self::XtsAes128 => 32,
            Self::XtsAes256 => 64,
        }
    }

    /// Encrypt `data` in place. `data` must hold at least one AES block.
    pub fn encrypt(self, key: &[u8], data: &mut [u8]) -> CryptoResult<()> {
        self.apply(key, data, true)
    }

    /// Decrypt `data` in place.
    pub fn decrypt(self, key: &[u8], data: &mut [u8]) -> CryptoResult<()> {
        self.apply(key, data, false)
    }

    fn apply(self, key: &[u8], data: &mut [u8], encrypt: bool) -> CryptoResult<()> {
        if key.len() != self.key_size() {
            return Err(CryptoError::InvalidArgument(format!(
                "XTS key must be {} bytes, got {}",
                self.key_size(),
                key.len()
            )));
        }
        if data.len() < 16 {
            return Err(CryptoError::InvalidArgument(
                "XTS input must be at least one block".into(),
            ));
        }
        match self {
            Self::XtsAes128 => xts_sector::<Aes128>(key, data, encrypt),
            Self::XtsAes256 => xts_sector::<Aes256>(key, data, encrypt),
        }
    }
}

fn xts_sector<C>(key: &[u8], data: &mut [u8], encrypt: bool) -> CryptoResult<()>
where
    C: BlockCipher + BlockEncrypt + BlockDecrypt + BlockSizeUser<BlockSize = U16> + KeyInit,
{
    let (data_key, tweak_key) = key.split_at(key.len() / 2);
    let cipher_1 = C::new_from_slice(data_key)
        .map_err(|e| CryptoError::InvalidArgument(format!("XTS data key: {e}")))?;
    let cipher_2 = C::new_from_slice(tweak_key)
        .map_err(|e| CryptoError::InvalidArgument(format!("XTS tweak key: {e}")))?;
    let xts = Xts128::<C>::new(cipher_1, cipher_2);

    let tweak = get_tweak_default(0);
    if encrypt {
        xts.encrypt_sector(data, tweak);
    } else {
        xts.decrypt_sector(data, tweak);
    }
    Ok(())
}
