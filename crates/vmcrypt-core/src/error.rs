use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Persisted data is structurally invalid (oversized field, truncation, bad length word).
    #[error("invalid format: {0}")]
    Format(String),

    #[error("invalid magic")]
    InvalidMagic,

    #[error("unsupported version {0:#x}")]
    UnsupportedVersion(u32),

    #[error("wrong password")]
    WrongPassword,

    #[error("unsupported cipher: {0}")]
    UnsupportedCipher(String),

    #[error("unsupported digest: {0}")]
    UnsupportedDigest(String),

    /// AEAD tag mismatch. No plaintext is released.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("out of memory")]
    NoMemory,

    #[error("KDF iteration count could not be determined")]
    CalibrationFailed,

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("object used after close")]
    UseAfterClose,

    #[error("end of stream")]
    EndOfStream,

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// True for errors caused by malformed or unrecognised persisted data.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CryptoError::Format(_)
                | CryptoError::InvalidMagic
                | CryptoError::UnsupportedVersion(_)
                | CryptoError::UnsupportedCipher(_)
                | CryptoError::UnsupportedDigest(_)
        )
    }
}

impl From<std::collections::TryReserveError> for CryptoError {
    fn from(_: std::collections::TryReserveError) -> Self {
        CryptoError::NoMemory
    }
}

impl From<CryptoError> for std::io::Error {
    fn from(err: CryptoError) -> Self {
        use std::io::ErrorKind;

        let kind = match &err {
            CryptoError::Io(_) => ErrorKind::Other,
            CryptoError::EndOfStream => ErrorKind::UnexpectedEof,
            CryptoError::NoMemory => ErrorKind::OutOfMemory,
            CryptoError::InvalidArgument(_) => ErrorKind::InvalidInput,
            CryptoError::InvalidOperation(_) | CryptoError::UseAfterClose => ErrorKind::Unsupported,
            _ => ErrorKind::InvalidData,
        };
        match err {
            CryptoError::Io(inner) => inner,
            other => std::io::Error::new(kind, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_classification() {
        assert!(CryptoError::InvalidMagic.is_format_error());
        assert!(CryptoError::UnsupportedVersion(0x0100).is_format_error());
        assert!(CryptoError::UnsupportedCipher("AES-XYZ".into()).is_format_error());
        assert!(!CryptoError::WrongPassword.is_format_error());
        assert!(!CryptoError::AuthenticationFailed.is_format_error());
    }

    #[test]
    fn test_io_conversion_preserves_inner() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let io: std::io::Error = CryptoError::Io(inner).into();
        assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied);

        let io: std::io::Error = CryptoError::AuthenticationFailed.into();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            CryptoError::UnsupportedVersion(0x0300).to_string(),
            "unsupported version 0x300"
        );
        assert_eq!(CryptoError::WrongPassword.to_string(), "wrong password");
    }
}
