//! Crypto context: the unlocked DEK plus the cipher it is used with
//!
//! A context is obtained either fresh ([`CryptoContext::create`], which
//! generates a DEK and seals it into a new key-store) or from an existing
//! key-store and password ([`CryptoContext::load`]). It stays usable until
//! [`CryptoContext::destroy`] wipes the DEK.
//!
//! Partial operation (CTR and XOR only) spreads one logical message over
//! several calls:
//!
//! ```text
//! Idle ──encrypt_partial──▶ Streaming(Encrypt) ──encrypt──▶ Finalized
//!  ▲                            │  ▲                             │
//!  │                            └──┘ encrypt_partial             │
//!  └──────────────── next partial call starts over ◀─────────────┘
//! ```
//!
//! The first partial output carries the IV; later outputs are raw
//! keystream-transformed bytes.

use hkdf::Hkdf;
use secrecy::SecretString;
use sha2::{Digest, Sha256};
use vmcrypt_core::{CryptoError, CryptoResult};

use crate::cipher::{self, CipherDescriptor};
use crate::engine::{engine_for, resolve_iv, CipherEngine, Keystream};
use crate::keystore::{KeyStore, KeyStoreSettings};
use crate::secret::SecretBytes;
use crate::wrap::WrapCipher;

/// HKDF info used to widen a 128-bit DEK into an XTS-AES-128 key.
const PADDING_SPLIT_INFO: &[u8] = b"vmcrypt-padding-split";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Observable state of the partial-operation sub-object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Streaming(Direction),
    Finalized(Direction),
}

enum StreamState {
    Idle,
    Streaming {
        direction: Direction,
        keystream: Box<dyn Keystream>,
    },
    Finalized(Direction),
}

pub struct CryptoContext {
    descriptor: &'static CipherDescriptor,
    engine: Box<dyn CipherEngine>,
    /// `None` once destroyed.
    dek: Option<SecretBytes>,
    keystore: String,
    settings: KeyStoreSettings,
    stream: StreamState,
}

impl CryptoContext {
    /// Generate a DEK for `cipher` and seal it with `password` using default settings.
    pub fn create(cipher: &str, password: &SecretString) -> CryptoResult<Self> {
        Self::create_with(cipher, password, KeyStoreSettings::default())
    }

    pub fn create_with(
        cipher: &str,
        password: &SecretString,
        settings: KeyStoreSettings,
    ) -> CryptoResult<Self> {
        let descriptor = cipher::lookup(cipher)
            .ok_or_else(|| CryptoError::UnsupportedCipher(cipher.to_string()))?;

        let dek = SecretBytes::random(descriptor.key_size)?;
        let keystore = KeyStore::seal(password, dek.as_bytes(), descriptor.name, &settings)?;

        tracing::info!(cipher = descriptor.name, "created crypto context");
        Ok(Self::ready(descriptor, dek, keystore, settings))
    }

    /// Unlock an existing key-store.
    pub fn load(keystore: &str, password: &SecretString) -> CryptoResult<Self> {
        Self::load_with(keystore, password, KeyStoreSettings::default())
    }

    /// Unlock an existing key-store. `settings` apply to later password changes.
    pub fn load_with(
        keystore: &str,
        password: &SecretString,
        settings: KeyStoreSettings,
    ) -> CryptoResult<Self> {
        let decoded = KeyStore::decode(keystore)?;
        let descriptor = cipher::lookup(decoded.cipher())
            .ok_or_else(|| CryptoError::UnsupportedCipher(decoded.cipher().to_string()))?;
        if decoded.key_size() != descriptor.key_size {
            return Err(CryptoError::Format(format!(
                "{} key-store carries a {}-byte DEK",
                descriptor.name,
                decoded.key_size()
            )));
        }

        let dek = decoded.unwrap_dek(password)?;

        tracing::info!(cipher = descriptor.name, "loaded crypto context");
        Ok(Self::ready(descriptor, dek, keystore.to_string(), settings))
    }

    fn ready(
        descriptor: &'static CipherDescriptor,
        dek: SecretBytes,
        keystore: String,
        settings: KeyStoreSettings,
    ) -> Self {
        Self {
            descriptor,
            engine: engine_for(descriptor),
            dek: Some(dek),
            keystore,
            settings,
            stream: StreamState::Idle,
        }
    }

    fn dek(&self) -> CryptoResult<&SecretBytes> {
        self.dek.as_ref().ok_or(CryptoError::UseAfterClose)
    }

    pub fn cipher(&self) -> &'static CipherDescriptor {
        self.descriptor
    }

    pub fn is_closed(&self) -> bool {
        self.dek.is_none()
    }

    pub fn stream_phase(&self) -> StreamPhase {
        match &self.stream {
            StreamState::Idle => StreamPhase::Idle,
            StreamState::Streaming { direction, .. } => StreamPhase::Streaming(*direction),
            StreamState::Finalized(direction) => StreamPhase::Finalized(*direction),
        }
    }

    /// Size of the whole-message encryption of `plain_len` bytes.
    pub fn query_encrypted_size(&self, plain_len: usize) -> CryptoResult<usize> {
        self.dek()?;
        Ok(plain_len + self.descriptor.mode.overhead())
    }

    /// Plaintext size of a `encrypted_len`-byte message, 0 if it cannot hold the overhead.
    pub fn query_decrypted_size(&self, encrypted_len: usize) -> CryptoResult<usize> {
        self.dek()?;
        Ok(encrypted_len.saturating_sub(self.descriptor.mode.overhead()))
    }

    /// Encrypt a whole message, or finish a partial encryption in progress.
    ///
    /// When finishing, `iv` must be `None` and `aad` is ignored, and the
    /// output carries no IV.
    pub fn encrypt(
        &mut self,
        iv: Option<&[u8]>,
        plaintext: &[u8],
        aad: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        self.dek()?;
        if self.is_streaming() {
            if iv.is_some() {
                return Err(CryptoError::InvalidArgument(
                    "IV is fixed by the first partial call".into(),
                ));
            }
            let out = self.continue_stream(Direction::Encrypt, plaintext)?;
            self.stream = StreamState::Finalized(Direction::Encrypt);
            return Ok(out);
        }
        if plaintext.is_empty() {
            return Err(CryptoError::InvalidArgument("plaintext must not be empty".into()));
        }
        self.engine.encrypt(self.dek()?.as_bytes(), iv, plaintext, aad)
    }

    /// Encrypt the next piece of a partial (streaming) message.
    pub fn encrypt_partial(&mut self, iv: Option<&[u8]>, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        self.dek()?;
        if self.is_streaming() {
            if iv.is_some() {
                return Err(CryptoError::InvalidArgument(
                    "IV is fixed by the first partial call".into(),
                ));
            }
            return self.continue_stream(Direction::Encrypt, plaintext);
        }

        let iv = resolve_iv(self.descriptor.mode.iv_size(), iv)?;
        let mut out = Vec::new();
        out.try_reserve_exact(iv.len() + plaintext.len())?;
        out.extend_from_slice(&iv);
        out.extend_from_slice(plaintext);

        let mut keystream = self.start_stream(&iv)?;
        keystream.apply(&mut out[iv.len()..]);
        self.stream = StreamState::Streaming {
            direction: Direction::Encrypt,
            keystream,
        };
        Ok(out)
    }

    /// Decrypt a whole message, or finish a partial decryption in progress.
    ///
    /// Returns `AuthenticationFailed` for a GCM tag mismatch; no plaintext
    /// is released in that case.
    pub fn decrypt(&mut self, message: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
        self.dek()?;
        if self.is_streaming() {
            let out = self.continue_stream(Direction::Decrypt, message)?;
            self.stream = StreamState::Finalized(Direction::Decrypt);
            return Ok(out);
        }
        self.engine.decrypt(self.dek()?.as_bytes(), message, aad)
    }

    /// Decrypt the next piece of a partial message. The first piece must start with the IV.
    pub fn decrypt_partial(&mut self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        self.dek()?;
        if self.is_streaming() {
            return self.continue_stream(Direction::Decrypt, data);
        }

        let iv_size = self.descriptor.mode.iv_size();
        if data.len() < iv_size {
            return Err(CryptoError::Format(format!(
                "first partial message piece must hold the {iv_size}-byte IV"
            )));
        }
        let (iv, body) = data.split_at(iv_size);
        let mut keystream = self.start_stream(iv)?;

        let mut out = Vec::new();
        out.try_reserve_exact(body.len())?;
        out.extend_from_slice(body);
        keystream.apply(&mut out);
        self.stream = StreamState::Streaming {
            direction: Direction::Decrypt,
            keystream,
        };
        Ok(out)
    }

    fn is_streaming(&self) -> bool {
        matches!(self.stream, StreamState::Streaming { .. })
    }

    fn start_stream(&self, iv: &[u8]) -> CryptoResult<Box<dyn Keystream>> {
        if !self.descriptor.mode.supports_streaming() {
            return Err(CryptoError::InvalidOperation(format!(
                "{} does not support partial operation",
                self.descriptor.name
            )));
        }
        self.engine.keystream(self.dek()?.as_bytes(), iv)
    }

    fn continue_stream(&mut self, wanted: Direction, data: &[u8]) -> CryptoResult<Vec<u8>> {
        let StreamState::Streaming {
            direction,
            keystream,
        } = &mut self.stream
        else {
            return Err(CryptoError::InvalidOperation("no partial operation in progress".into()));
        };
        if *direction != wanted {
            return Err(CryptoError::InvalidOperation(format!(
                "partial {direction:?} in progress"
            )));
        }

        let mut out = Vec::new();
        out.try_reserve_exact(data.len())?;
        out.extend_from_slice(data);
        keystream.apply(&mut out);
        Ok(out)
    }

    /// Re-seal the DEK under `new_password`.
    ///
    /// The stored key-store only changes once the new one has been built.
    pub fn change_password(&mut self, new_password: &SecretString) -> CryptoResult<()> {
        let dek = self.dek()?;
        let keystore = KeyStore::seal(new_password, dek.as_bytes(), self.descriptor.name, &self.settings)?;
        self.keystore = keystore;
        tracing::info!(cipher = self.descriptor.name, "changed key-store password");
        Ok(())
    }

    /// The current key-store text.
    pub fn save(&self) -> CryptoResult<&str> {
        self.dek()?;
        Ok(&self.keystore)
    }

    /// Wipe the DEK and any partial-operation state.
    pub fn destroy(&mut self) -> CryptoResult<()> {
        if self.dek.take().is_none() {
            return Err(CryptoError::UseAfterClose);
        }
        self.stream = StreamState::Idle;
        tracing::debug!(cipher = self.descriptor.name, "destroyed crypto context");
        Ok(())
    }

    /// Derive a value in `0..unit` from `data` under the DEK.
    ///
    /// SHA-256 of `data` is XTS-encrypted with a key taken from the DEK, and
    /// the sixteen little-endian words of the result are XOR-folded. The
    /// container uses this to size its leading padding, so it must stay
    /// stable for a given DEK.
    pub fn padding_split(&self, unit: usize, data: &[u8]) -> CryptoResult<usize> {
        if unit == 0 {
            return Err(CryptoError::InvalidArgument("unit must be non-zero".into()));
        }
        let dek = self.dek()?;

        let (wrap, key) = match dek.len() {
            32 => (WrapCipher::XtsAes128, dek.try_duplicate()?),
            64 => (WrapCipher::XtsAes256, dek.try_duplicate()?),
            _ => {
                let mut okm = SecretBytes::zeroed(WrapCipher::XtsAes128.key_size())?;
                Hkdf::<Sha256>::new(None, dek.as_bytes())
                    .expand(PADDING_SPLIT_INFO, okm.as_bytes_mut())
                    .map_err(|e| CryptoError::Derivation(format!("HKDF expand failed: {e}")))?;
                (WrapCipher::XtsAes128, okm)
            }
        };

        let mut block: [u8; 32] = Sha256::digest(data).into();
        wrap.encrypt(key.as_bytes(), &mut block)?;
        let folded = block
            .chunks_exact(2)
            .fold(0u16, |acc, word| acc ^ u16::from_le_bytes([word[0], word[1]]));
        Ok(usize::from(folded) % unit)
    }
}

impl std::fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoContext")
            .field("cipher", &self.descriptor.name)
            .field("closed", &self.is_closed())
            .field("stream", &self.stream_phase())
            .finish()
    }
}
