//! vmcrypt-crypto: full-VM encryption core
//!
//! Architecture: one random DEK per VM, sealed in a password-protected
//! key-store, used for whole-message AES-GCM/CTR encryption and for
//! chunked encrypted containers (saved state, NVRAM, logs).
//!
//! Key hierarchy:
//! ```text
//! Password
//!   └── Wrapping key: PBKDF2-SHA{1,256,512}(password, dek_salt, calibrated iterations)
//!       └── DEK (16/32 bytes, XTS-AES-wrapped in the 252-byte key-store envelope)
//!           ├── Verification digest: PBKDF2(DEK, digest_salt, digest_iterations)
//!           ├── Messages: AES-GCM / AES-CTR (IV || TAG || ciphertext)
//!           └── Container chunks: same cipher, AAD = chunk id (u64 LE)
//! ```
//!
//! Container layout: `header(64) | leading padding | chunks | trailing padding`,
//! where leading + trailing padding is one chunk width and the split is
//! derived from the header under the DEK.

pub mod cipher;
pub mod container;
pub mod context;
pub mod ctr;
pub mod engine;
pub mod gcm;
pub mod kdf;
pub mod keystore;
pub mod secret;
pub mod wrap;

pub use cipher::{lookup, CipherAlgorithm, CipherDescriptor, CipherMode, Primitive};
pub use container::{decrypt_stream, encrypt_stream, Backing, EncryptedContainer};
pub use context::{CryptoContext, Direction, StreamPhase};
pub use kdf::{benchmark_iterations, derive, KdfDigest};
pub use keystore::{KeyStore, KeyStoreSettings, Unsealed};
pub use secret::SecretBytes;
pub use wrap::WrapCipher;

pub use vmcrypt_core::{CryptoError, CryptoResult};
