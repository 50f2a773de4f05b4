//! Key derivation: PBKDF2-HMAC with a runtime-calibrated iteration count

use std::time::{Duration, Instant};

use sha1::Sha1;
use sha2::{Sha256, Sha512};
use vmcrypt_core::{CryptoError, CryptoResult};

use crate::secret::SecretBytes;

/// Iterations per calibration round, and the floor for any calibrated count.
pub const MIN_ITERATIONS: u32 = 20_000;

/// Default wall-clock target for [`benchmark_iterations`].
pub const DEFAULT_CALIBRATION_TARGET: Duration = Duration::from_millis(250);

/// Size of the zero salt used while calibrating.
const CALIBRATION_SALT_SIZE: usize = 32;

/// HMAC digest used by PBKDF2, identified in key-stores by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KdfDigest {
    Sha1,
    Sha256,
    Sha512,
}

impl KdfDigest {
    pub fn from_name(name: &str) -> CryptoResult<Self> {
        match name {
            "PBKDF2-SHA1" => Ok(KdfDigest::Sha1),
            "PBKDF2-SHA256" => Ok(KdfDigest::Sha256),
            "PBKDF2-SHA512" => Ok(KdfDigest::Sha512),
            other => Err(CryptoError::UnsupportedDigest(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            KdfDigest::Sha1 => "PBKDF2-SHA1",
            KdfDigest::Sha256 => "PBKDF2-SHA256",
            KdfDigest::Sha512 => "PBKDF2-SHA512",
        }
    }

    /// Output size of the underlying hash in bytes.
    pub fn hash_size(self) -> usize {
        match self {
            KdfDigest::Sha1 => 20,
            KdfDigest::Sha256 => 32,
            KdfDigest::Sha512 => 64,
        }
    }
}

fn pbkdf2_into(digest: KdfDigest, password: &[u8], salt: &[u8], rounds: u32, out: &mut [u8]) {
    match digest {
        KdfDigest::Sha1 => pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, rounds, out),
        KdfDigest::Sha256 => pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, rounds, out),
        KdfDigest::Sha512 => pbkdf2::pbkdf2_hmac::<Sha512>(password, salt, rounds, out),
    }
}

/// Derive `output_len` bytes from `password` and `salt` with PBKDF2.
///
/// Deterministic for identical inputs. The output lives in a zeroizing buffer.
pub fn derive(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    digest: KdfDigest,
    output_len: usize,
) -> CryptoResult<SecretBytes> {
    if iterations == 0 {
        return Err(CryptoError::Derivation(
            "iteration count must be non-zero".into(),
        ));
    }
    if output_len == 0 {
        return Err(CryptoError::Derivation("output length must be non-zero".into()));
    }

    let mut out = SecretBytes::zeroed(output_len)
        .map_err(|_| CryptoError::Derivation("cannot allocate output buffer".into()))?;
    pbkdf2_into(digest, password, salt, iterations, out.as_bytes_mut());
    Ok(out)
}

/// Measure how many PBKDF2 iterations fit in `target` on this machine.
///
/// Runs rounds of [`MIN_ITERATIONS`] over zeroed input until the target has
/// elapsed, so the result is always a multiple of the round size and never
/// below it. Returns 0 if the scratch buffers cannot be allocated.
pub fn benchmark_iterations(
    digest: KdfDigest,
    input_len: usize,
    output_len: usize,
    target: Duration,
) -> u32 {
    if output_len == 0 {
        return 0;
    }
    let (Ok(input), Ok(mut output)) = (SecretBytes::zeroed(input_len), SecretBytes::zeroed(output_len))
    else {
        return 0;
    };
    let salt = [0u8; CALIBRATION_SALT_SIZE];

    let start = Instant::now();
    let mut total: u32 = 0;
    loop {
        pbkdf2_into(digest, input.as_bytes(), &salt, MIN_ITERATIONS, output.as_bytes_mut());
        total = total.saturating_add(MIN_ITERATIONS);
        if start.elapsed() >= target || total == u32::MAX {
            break;
        }
    }

    let iterations = total.max(MIN_ITERATIONS);
    tracing::debug!(
        digest = digest.name(),
        iterations,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "calibrated PBKDF2 iteration count"
    );
    iterations
}
