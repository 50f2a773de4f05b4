//! Static cipher registry

/// Supported DEK ciphers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgorithm {
    /// Test/diagnostic transform only. Provides no confidentiality.
    Xor,
    AesGcm128,
    AesGcm256,
    AesCtr128,
    AesCtr256,
}

/// Mode of operation, which determines the message layout and overhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    Xor,
    Gcm,
    Ctr,
}

/// Underlying block primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    None,
    Aes128,
    Aes256,
}

/// GCM nonce length.
pub const GCM_IV_SIZE: usize = 12;

/// GCM authentication tag length.
pub const GCM_TAG_SIZE: usize = 16;

/// CTR initial counter block length.
pub const CTR_IV_SIZE: usize = 16;

impl CipherMode {
    /// Length of the IV prefix carried by every message.
    pub fn iv_size(self) -> usize {
        match self {
            CipherMode::Xor => 0,
            CipherMode::Gcm => GCM_IV_SIZE,
            CipherMode::Ctr => CTR_IV_SIZE,
        }
    }

    pub fn tag_size(self) -> usize {
        match self {
            CipherMode::Gcm => GCM_TAG_SIZE,
            CipherMode::Xor | CipherMode::Ctr => 0,
        }
    }

    /// Bytes added to a plaintext by a whole-message encryption.
    pub fn overhead(self) -> usize {
        self.iv_size() + self.tag_size()
    }

    pub fn is_authenticated(self) -> bool {
        self == CipherMode::Gcm
    }

    pub fn supports_streaming(self) -> bool {
        self != CipherMode::Gcm
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct CipherDescriptor {
    pub name: &'static str,
    pub algorithm: CipherAlgorithm,
    pub mode: CipherMode,
    pub primitive: Primitive,
    /// DEK length in bytes
    pub key_size: usize,
}

static CIPHERS: [CipherDescriptor; 5] = [
    CipherDescriptor {
        name: "XOR",
        algorithm: CipherAlgorithm::Xor,
        mode: CipherMode::Xor,
        primitive: Primitive::None,
        key_size: 16,
    },
    CipherDescriptor {
        name: "AES-GCM128",
        algorithm: CipherAlgorithm::AesGcm128,
        mode: CipherMode::Gcm,
        primitive: Primitive::Aes128,
        key_size: 16,
    },
    CipherDescriptor {
        name: "AES-GCM256",
        algorithm: CipherAlgorithm::AesGcm256,
        mode: CipherMode::Gcm,
        primitive: Primitive::Aes256,
        key_size: 32,
    },
    CipherDescriptor {
        name: "AES-CTR128",
        algorithm: CipherAlgorithm::AesCtr128,
        mode: CipherMode::Ctr,
        primitive: Primitive::Aes128,
        key_size: 16,
    },
    CipherDescriptor {
        name: "AES-CTR256",
        algorithm: CipherAlgorithm::AesCtr256,
        mode: CipherMode::Ctr,
        primitive: Primitive::Aes256,
        key_size: 32,
    },
];

/// Look up a cipher by exact, case-sensitive name.
pub fn lookup(name: &str) -> Option<&'static CipherDescriptor> {
    CIPHERS.iter().find(|c| c.name == name)
}

/// Every registered cipher, in registry order.
pub fn all() -> &'static [CipherDescriptor] {
    &CIPHERS
}
