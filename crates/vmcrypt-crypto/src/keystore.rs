//! Password-protected key-store envelope
//!
//! A 252-byte little-endian record, base64-encoded for storage:
//!
//! ```text
//! off  size  field
//!   0     4  magic "ENCS" (0x454e4353)
//!   4     2  version 0x0200
//!   6     2  reserved, zero
//!   8    32  DEK cipher name, NUL padded
//!  40    32  KDF name, NUL padded
//!  72     4  DEK size
//!  76    32  DEK verification digest
//! 108     4  digest size
//! 112    32  digest salt
//! 144     4  digest iterations
//! 148    32  wrapping salt
//! 180     4  wrapping iterations (calibrated)
//! 184     4  wrapped DEK size
//! 188    64  wrapped DEK (XTS, all-zero tweak)
//! ```
//!
//! The wrapping key is PBKDF2(password, wrapping salt). The password is
//! verified by recomputing PBKDF2(DEK, digest salt) after unwrapping.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use vmcrypt_core::config::KeyStoreConfig;
use vmcrypt_core::{CryptoError, CryptoResult};

use crate::kdf::{self, KdfDigest, DEFAULT_CALIBRATION_TARGET, MIN_ITERATIONS};
use crate::secret::{fill_random, SecretBytes};
use crate::wrap::WrapCipher;

pub const KEYSTORE_MAGIC: u32 = 0x454e_4353;
pub const KEYSTORE_VERSION: u16 = 0x0200;
pub const KEYSTORE_SIZE: usize = 252;

const NAME_SIZE: usize = 32;
const DIGEST_SIZE: usize = 32;
const SALT_SIZE: usize = 32;
const DEK_ENC_SIZE: usize = 64;

const OFF_MAGIC: usize = 0;
const OFF_VERSION: usize = 4;
const OFF_RESERVED: usize = 6;
const OFF_CIPHER: usize = 8;
const OFF_KDF: usize = 40;
const OFF_KEY_SIZE: usize = 72;
const OFF_DIGEST: usize = 76;
const OFF_DIGEST_LEN: usize = 108;
const OFF_DIGEST_SALT: usize = 112;
const OFF_DIGEST_ITER: usize = 144;
const OFF_DEK_SALT: usize = 148;
const OFF_DEK_ITER: usize = 180;
const OFF_DEK_ENC_LEN: usize = 184;
const OFF_DEK_ENC: usize = 188;

/// Parameters for sealing a new key-store.
#[derive(Debug, Clone)]
pub struct KeyStoreSettings {
    pub digest: KdfDigest,
    /// Wall-clock budget for the wrapping-key derivation.
    pub calibration_target: Duration,
    pub digest_iterations: u32,
}

impl Default for KeyStoreSettings {
    fn default() -> Self {
        Self {
            digest: KdfDigest::Sha256,
            calibration_target: DEFAULT_CALIBRATION_TARGET,
            digest_iterations: MIN_ITERATIONS,
        }
    }
}

impl KeyStoreSettings {
    pub fn from_config(config: &KeyStoreConfig) -> CryptoResult<Self> {
        if config.digest_iterations == 0 {
            return Err(CryptoError::Config(
                "keystore.digest_iterations must be non-zero".into(),
            ));
        }
        Ok(Self {
            digest: KdfDigest::from_name(&config.kdf)?,
            calibration_target: Duration::from_millis(config.calibration_ms),
            digest_iterations: config.digest_iterations,
        })
    }
}

/// A decoded key-store. Holds only wrapped key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    cipher: String,
    digest: KdfDigest,
    key_size: usize,
    dek_digest: [u8; DIGEST_SIZE],
    dek_digest_len: usize,
    dek_digest_salt: [u8; SALT_SIZE],
    dek_digest_iterations: u32,
    dek_salt: [u8; SALT_SIZE],
    dek_iterations: u32,
    dek_enc: [u8; DEK_ENC_SIZE],
    dek_enc_len: usize,
}

/// Result of [`KeyStore::unseal`]: the envelope plus the DEK when a password was given.
#[derive(Debug)]
pub struct Unsealed {
    pub keystore: KeyStore,
    pub dek: Option<SecretBytes>,
}

impl Unsealed {
    pub fn cipher(&self) -> &str {
        self.keystore.cipher()
    }
}

impl KeyStore {
    /// Protect `dek` with `password` and return the base64 envelope.
    pub fn seal(
        password: &SecretString,
        dek: &[u8],
        cipher: &str,
        settings: &KeyStoreSettings,
    ) -> CryptoResult<String> {
        Ok(Self::create(password, dek, cipher, settings)?.encode())
    }

    /// Build the envelope for `dek`, calibrating the wrapping iteration count.
    pub fn create(
        password: &SecretString,
        dek: &[u8],
        cipher: &str,
        settings: &KeyStoreSettings,
    ) -> CryptoResult<Self> {
        let password = password.expose_secret().as_bytes();
        if password.is_empty() {
            return Err(CryptoError::InvalidArgument("password must not be empty".into()));
        }
        if !matches!(dek.len(), 16 | 32 | 64) {
            return Err(CryptoError::InvalidArgument(format!(
                "DEK must be 16, 32 or 64 bytes, got {}",
                dek.len()
            )));
        }
        if cipher.is_empty() || cipher.len() >= NAME_SIZE || cipher.contains('\0') {
            return Err(CryptoError::InvalidArgument(format!(
                "cipher name {cipher:?} does not fit the key-store"
            )));
        }
        if settings.digest_iterations == 0 {
            return Err(CryptoError::InvalidArgument(
                "digest iteration count must be non-zero".into(),
            ));
        }
        let wrap = WrapCipher::for_cipher(cipher)?;
        let digest = settings.digest;

        // Verification digest of the plaintext DEK.
        let mut dek_digest_salt = [0u8; SALT_SIZE];
        fill_random(&mut dek_digest_salt);
        let dek_digest_len = digest.hash_size().min(DIGEST_SIZE);
        let check = kdf::derive(
            dek,
            &dek_digest_salt,
            settings.digest_iterations,
            digest,
            dek_digest_len,
        )?;
        let mut dek_digest = [0u8; DIGEST_SIZE];
        dek_digest[..dek_digest_len].copy_from_slice(check.as_bytes());

        // Wrapping key.
        let mut dek_salt = [0u8; SALT_SIZE];
        fill_random(&mut dek_salt);
        let dek_iterations = kdf::benchmark_iterations(
            digest,
            password.len(),
            wrap.key_size(),
            settings.calibration_target,
        );
        if dek_iterations == 0 {
            return Err(CryptoError::CalibrationFailed);
        }
        let wrapping_key = kdf::derive(password, &dek_salt, dek_iterations, digest, wrap.key_size())?;

        let mut wrapped = SecretBytes::from_slice(dek)?;
        wrap.encrypt(wrapping_key.as_bytes(), wrapped.as_bytes_mut())?;
        let mut dek_enc = [0u8; DEK_ENC_SIZE];
        dek_enc[..dek.len()].copy_from_slice(wrapped.as_bytes());

        tracing::debug!(
            cipher,
            kdf = digest.name(),
            dek_iterations,
            "sealed key-store"
        );

        Ok(Self {
            cipher: cipher.to_string(),
            digest,
            key_size: dek.len(),
            dek_digest,
            dek_digest_len,
            dek_digest_salt,
            dek_digest_iterations: settings.digest_iterations,
            dek_salt,
            dek_iterations,
            dek_enc,
            dek_enc_len: dek.len(),
        })
    }

    /// Decode `text` and, when a password is given, unwrap and verify the DEK.
    pub fn unseal(text: &str, password: Option<&SecretString>) -> CryptoResult<Unsealed> {
        let keystore = Self::decode(text)?;
        let dek = match password {
            Some(password) => Some(keystore.unwrap_dek(password)?),
            None => None,
        };
        Ok(Unsealed { keystore, dek })
    }

    /// Cipher name of an encoded key-store, without deriving anything.
    pub fn peek_cipher(text: &str) -> CryptoResult<String> {
        Ok(Self::decode(text)?.cipher)
    }

    /// Unwrap the DEK with `password`.
    ///
    /// Returns `WrongPassword` when the recomputed verification digest does
    /// not match. The unwrapped buffer is wiped in that case.
    pub fn unwrap_dek(&self, password: &SecretString) -> CryptoResult<SecretBytes> {
        let wrap = WrapCipher::for_cipher(&self.cipher)?;
        let wrapping_key = kdf::derive(
            password.expose_secret().as_bytes(),
            &self.dek_salt,
            self.dek_iterations,
            self.digest,
            wrap.key_size(),
        )?;

        let mut dek = SecretBytes::from_slice(&self.dek_enc[..self.dek_enc_len])?;
        wrap.decrypt(wrapping_key.as_bytes(), dek.as_bytes_mut())?;

        let check = kdf::derive(
            dek.as_bytes(),
            &self.dek_digest_salt,
            self.dek_digest_iterations,
            self.digest,
            self.dek_digest_len,
        )?;
        if !bool::from(check.as_bytes().ct_eq(&self.dek_digest[..self.dek_digest_len])) {
            return Err(CryptoError::WrongPassword);
        }
        Ok(dek)
    }

    pub fn cipher(&self) -> &str {
        &self.cipher
    }

    pub fn kdf(&self) -> KdfDigest {
        self.digest
    }

    /// DEK length in bytes.
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// Calibrated PBKDF2 iteration count of the wrapping key.
    pub fn dek_iterations(&self) -> u32 {
        self.dek_iterations
    }

    pub fn digest_iterations(&self) -> u32 {
        self.dek_digest_iterations
    }

    /// Base64 text form (standard alphabet, padded, no line breaks).
    pub fn encode(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Parse the base64 text form. ASCII whitespace is ignored.
    pub fn decode(text: &str) -> CryptoResult<Self> {
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let raw = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| CryptoError::Format(format!("key-store is not valid base64: {e}")))?;
        Self::from_bytes(&raw)
    }

    pub fn to_bytes(&self) -> [u8; KEYSTORE_SIZE] {
        let mut buf = [0u8; KEYSTORE_SIZE];
        put_u32(&mut buf, OFF_MAGIC, KEYSTORE_MAGIC);
        buf[OFF_VERSION..OFF_VERSION + 2].copy_from_slice(&KEYSTORE_VERSION.to_le_bytes());
        put_name(&mut buf, OFF_CIPHER, &self.cipher);
        put_name(&mut buf, OFF_KDF, self.digest.name());
        put_u32(&mut buf, OFF_KEY_SIZE, self.key_size as u32);
        buf[OFF_DIGEST..OFF_DIGEST + DIGEST_SIZE].copy_from_slice(&self.dek_digest);
        put_u32(&mut buf, OFF_DIGEST_LEN, self.dek_digest_len as u32);
        buf[OFF_DIGEST_SALT..OFF_DIGEST_SALT + SALT_SIZE].copy_from_slice(&self.dek_digest_salt);
        put_u32(&mut buf, OFF_DIGEST_ITER, self.dek_digest_iterations);
        buf[OFF_DEK_SALT..OFF_DEK_SALT + SALT_SIZE].copy_from_slice(&self.dek_salt);
        put_u32(&mut buf, OFF_DEK_ITER, self.dek_iterations);
        put_u32(&mut buf, OFF_DEK_ENC_LEN, self.dek_enc_len as u32);
        buf[OFF_DEK_ENC..OFF_DEK_ENC + DEK_ENC_SIZE].copy_from_slice(&self.dek_enc);
        buf
    }

    /// Parse and validate the binary envelope.
    ///
    /// Every size field is checked against its buffer before use, and all
    /// padding must be zero.
    pub fn from_bytes(raw: &[u8]) -> CryptoResult<Self> {
        if raw.len() != KEYSTORE_SIZE {
            return Err(CryptoError::Format(format!(
                "key-store must be {KEYSTORE_SIZE} bytes, got {}",
                raw.len()
            )));
        }

        if get_u32(raw, OFF_MAGIC) != KEYSTORE_MAGIC {
            return Err(CryptoError::InvalidMagic);
        }
        let version = u16::from_le_bytes([raw[OFF_VERSION], raw[OFF_VERSION + 1]]);
        if version != KEYSTORE_VERSION {
            return Err(CryptoError::UnsupportedVersion(u32::from(version)));
        }
        if raw[OFF_RESERVED..OFF_RESERVED + 2] != [0, 0] {
            return Err(CryptoError::Format("reserved header bytes are not zero".into()));
        }

        let cipher = get_name(raw, OFF_CIPHER)?;
        let digest = KdfDigest::from_name(&get_name(raw, OFF_KDF)?)?;

        let key_size = get_u32(raw, OFF_KEY_SIZE) as usize;
        if !matches!(key_size, 16 | 32 | 64) {
            return Err(CryptoError::Format(format!("invalid DEK size {key_size}")));
        }

        let dek_digest_len = get_u32(raw, OFF_DIGEST_LEN) as usize;
        if dek_digest_len != digest.hash_size().min(DIGEST_SIZE) {
            return Err(CryptoError::Format(format!(
                "invalid DEK digest size {dek_digest_len}"
            )));
        }
        let dek_enc_len = get_u32(raw, OFF_DEK_ENC_LEN) as usize;
        if dek_enc_len > DEK_ENC_SIZE || dek_enc_len != key_size {
            return Err(CryptoError::Format(format!(
                "invalid wrapped DEK size {dek_enc_len}"
            )));
        }

        let dek_digest_iterations = get_u32(raw, OFF_DIGEST_ITER);
        let dek_iterations = get_u32(raw, OFF_DEK_ITER);
        if dek_digest_iterations == 0 || dek_iterations == 0 {
            return Err(CryptoError::Format("zero iteration count".into()));
        }

        let mut dek_digest = [0u8; DIGEST_SIZE];
        dek_digest.copy_from_slice(&raw[OFF_DIGEST..OFF_DIGEST + DIGEST_SIZE]);
        let mut dek_enc = [0u8; DEK_ENC_SIZE];
        dek_enc.copy_from_slice(&raw[OFF_DEK_ENC..OFF_DEK_ENC + DEK_ENC_SIZE]);
        if dek_digest[dek_digest_len..].iter().any(|&b| b != 0)
            || dek_enc[dek_enc_len..].iter().any(|&b| b != 0)
        {
            return Err(CryptoError::Format("non-zero bytes past field length".into()));
        }

        let mut dek_digest_salt = [0u8; SALT_SIZE];
        dek_digest_salt.copy_from_slice(&raw[OFF_DIGEST_SALT..OFF_DIGEST_SALT + SALT_SIZE]);
        let mut dek_salt = [0u8; SALT_SIZE];
        dek_salt.copy_from_slice(&raw[OFF_DEK_SALT..OFF_DEK_SALT + SALT_SIZE]);

        Ok(Self {
            cipher,
            digest,
            key_size,
            dek_digest,
            dek_digest_len,
            dek_digest_salt,
            dek_digest_iterations,
            dek_salt,
            dek_iterations,
            dek_enc,
            dek_enc_len,
        })
    }
}

fn put_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(word)
}

fn put_name(buf: &mut [u8], off: usize, name: &str) {
    buf[off..off + name.len()].copy_from_slice(name.as_bytes());
}

fn get_name(buf: &[u8], off: usize) -> CryptoResult<String> {
    let field = &buf[off..off + NAME_SIZE];
    let end = field
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| CryptoError::Format("name field is not NUL-terminated".into()))?;
    if end == 0 {
        return Err(CryptoError::Format("empty name field".into()));
    }
    if field[end..].iter().any(|&b| b != 0) {
        return Err(CryptoError::Format("garbage after name terminator".into()));
    }
    String::from_utf8(field[..end].to_vec())
        .map_err(|_| CryptoError::Format("name field is not UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_settings() -> KeyStoreSettings {
        KeyStoreSettings {
            calibration_target: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn password() -> SecretString {
        SecretString::from("correct horse battery staple")
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let dek = [0x5au8; 32];
        let text = KeyStore::seal(&password(), &dek, "AES-GCM256", &fast_settings()).unwrap();

        let unsealed = KeyStore::unseal(&text, Some(&password())).unwrap();
        assert_eq!(unsealed.cipher(), "AES-GCM256");
        assert_eq!(unsealed.dek.unwrap().as_bytes(), &dek);
        assert_eq!(unsealed.keystore.kdf(), KdfDigest::Sha256);
        assert!(unsealed.keystore.dek_iterations() >= MIN_ITERATIONS);
        assert_eq!(unsealed.keystore.digest_iterations(), MIN_ITERATIONS);
    }

    #[test]
    fn test_envelope_layout() {
        let dek = [1u8; 16];
        let ks = KeyStore::create(&password(), &dek, "AES-CTR128", &fast_settings()).unwrap();
        let raw = ks.to_bytes();

        assert_eq!(&raw[0..4], b"SCNE", "magic is little-endian 'ENCS'");
        assert_eq!(&raw[4..6], &[0x00, 0x02]);
        assert_eq!(&raw[8..18], b"AES-CTR128");
        assert_eq!(raw[18], 0);
        assert_eq!(&raw[40..53], b"PBKDF2-SHA256");
        assert_eq!(get_u32(&raw, 72), 16);
        assert_eq!(get_u32(&raw, 108), 32);
        assert_eq!(get_u32(&raw, 144), MIN_ITERATIONS);
        assert_eq!(get_u32(&raw, 184), 16);
        assert!(raw[188 + 16..].iter().all(|&b| b == 0));

        let text = ks.encode();
        assert!(!text.contains('\n'));
        assert_eq!(STANDARD.decode(&text).unwrap().len(), KEYSTORE_SIZE);
    }

    #[test]
    fn test_wrong_password() {
        let text = KeyStore::seal(&password(), &[3u8; 16], "AES-GCM128", &fast_settings()).unwrap();
        let err = KeyStore::unseal(&text, Some(&SecretString::from("Tr0ub4dor&3"))).unwrap_err();
        assert!(matches!(err, CryptoError::WrongPassword), "got {err:?}");
    }

    #[test]
    fn test_unseal_without_password_returns_cipher_only() {
        let text = KeyStore::seal(&password(), &[3u8; 32], "AES-CTR256", &fast_settings()).unwrap();
        let unsealed = KeyStore::unseal(&text, None).unwrap();
        assert_eq!(unsealed.cipher(), "AES-CTR256");
        assert!(unsealed.dek.is_none());
        assert_eq!(KeyStore::peek_cipher(&text).unwrap(), "AES-CTR256");
    }

    #[test]
    fn test_digest_family() {
        for digest in [KdfDigest::Sha1, KdfDigest::Sha512] {
            let settings = KeyStoreSettings {
                digest,
                ..fast_settings()
            };
            let text = KeyStore::seal(&password(), &[8u8; 32], "AES-GCM256", &settings).unwrap();
            let unsealed = KeyStore::unseal(&text, Some(&password())).unwrap();
            assert_eq!(unsealed.keystore.kdf(), digest);
            assert_eq!(unsealed.dek.unwrap().as_bytes(), &[8u8; 32]);
        }
    }

    #[test]
    fn test_disk_cipher_names() {
        let dek = [0x11u8; 64];
        let text = KeyStore::seal(&password(), &dek, "AES-XTS256-PLAIN64", &fast_settings()).unwrap();
        let unsealed = KeyStore::unseal(&text, Some(&password())).unwrap();
        assert_eq!(unsealed.cipher(), "AES-XTS256-PLAIN64");
        assert_eq!(unsealed.dek.unwrap().as_bytes(), &dek);
    }

    #[test]
    fn test_decode_tolerates_line_breaks() {
        let text = KeyStore::seal(&password(), &[4u8; 16], "XOR", &fast_settings()).unwrap();
        let wrapped: String = text
            .as_bytes()
            .chunks(64)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(KeyStore::decode(&wrapped).unwrap(), KeyStore::decode(&text).unwrap());
    }

    #[test]
    fn test_rejects_bad_magic_and_version() {
        let ks = KeyStore::create(&password(), &[4u8; 16], "AES-GCM128", &fast_settings()).unwrap();

        let mut raw = ks.to_bytes();
        raw[0] ^= 0xff;
        assert!(matches!(KeyStore::from_bytes(&raw), Err(CryptoError::InvalidMagic)));

        let mut raw = ks.to_bytes();
        raw[5] = 0x01;
        assert!(matches!(
            KeyStore::from_bytes(&raw),
            Err(CryptoError::UnsupportedVersion(0x0100))
        ));
    }

    #[test]
    fn test_rejects_oversized_fields() {
        let ks = KeyStore::create(&password(), &[4u8; 32], "AES-GCM256", &fast_settings()).unwrap();

        for (off, value) in [
            (OFF_KEY_SIZE, 1u32 << 21),
            (OFF_KEY_SIZE, 48),
            (OFF_DIGEST_LEN, 33),
            (OFF_DIGEST_LEN, 0),
            (OFF_DEK_ENC_LEN, 65),
            (OFF_DEK_ITER, 0),
        ] {
            let mut raw = ks.to_bytes();
            put_u32(&mut raw, off, value);
            let err = KeyStore::from_bytes(&raw).unwrap_err();
            assert!(err.is_format_error(), "offset {off} value {value}: {err:?}");
        }
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(KeyStore::from_bytes(&[0u8; 251]).unwrap_err().is_format_error());
        assert!(KeyStore::decode("not base64 at all!").unwrap_err().is_format_error());
        assert!(KeyStore::decode("").unwrap_err().is_format_error());
    }

    #[test]
    fn test_structural_tamper_never_yields_dek() {
        let ks = KeyStore::create(&password(), &[0x77u8; 32], "AES-GCM256", &fast_settings()).unwrap();
        let pristine = ks.to_bytes();

        // Iteration counts are skipped: a flipped high byte would make the
        // derivation run for minutes.
        let offsets = (0..8)
            .chain(OFF_CIPHER..OFF_CIPHER + NAME_SIZE)
            .chain(OFF_KDF..OFF_KDF + NAME_SIZE)
            .chain(OFF_KEY_SIZE..OFF_KEY_SIZE + 4)
            .chain(OFF_DIGEST..OFF_DIGEST + DIGEST_SIZE + 4)
            .chain(OFF_DEK_ENC_LEN..KEYSTORE_SIZE);

        for off in offsets {
            let mut raw = pristine;
            raw[off] ^= 0x01;
            let result = KeyStore::from_bytes(&raw).and_then(|ks| ks.unwrap_dek(&password()));
            match result {
                Err(err) => assert!(
                    err.is_format_error() || matches!(err, CryptoError::WrongPassword),
                    "offset {off}: unexpected {err:?}"
                ),
                Ok(_) => panic!("offset {off}: tampered key-store unwrapped"),
            }
        }
    }

    #[test]
    fn test_create_validates_inputs() {
        let s = fast_settings();
        assert!(KeyStore::create(&SecretString::from(""), &[0u8; 16], "XOR", &s).is_err());
        assert!(KeyStore::create(&password(), &[0u8; 24], "XOR", &s).is_err());
        assert!(matches!(
            KeyStore::create(&password(), &[0u8; 16], "ROT13", &s),
            Err(CryptoError::UnsupportedCipher(_))
        ));
    }

    #[test]
    fn test_settings_from_config() {
        let config = KeyStoreConfig {
            kdf: "PBKDF2-SHA512".into(),
            calibration_ms: 10,
            digest_iterations: 30_000,
        };
        let settings = KeyStoreSettings::from_config(&config).unwrap();
        assert_eq!(settings.digest, KdfDigest::Sha512);
        assert_eq!(settings.calibration_target, Duration::from_millis(10));

        let bad = KeyStoreConfig {
            kdf: "BCRYPT".into(),
            ..KeyStoreConfig::default()
        };
        assert!(matches!(
            KeyStoreSettings::from_config(&bad),
            Err(CryptoError::UnsupportedDigest(_))
        ));
    }
}
