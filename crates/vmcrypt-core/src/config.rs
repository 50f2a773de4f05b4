use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration (loaded from vmcrypt.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VmcryptConfig {
    pub keystore: KeyStoreConfig,
    pub container: ContainerConfig,
    pub logging: LoggingConfig,
}

/// Parameters used when sealing a new key-store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreConfig {
    /// KDF name written into new key-stores (default: PBKDF2-SHA256)
    pub kdf: String,
    /// Wall-clock target for iteration calibration in milliseconds (default: 250)
    pub calibration_ms: u64,
    /// PBKDF2 iterations for the DEK verification digest (default: 20000)
    pub digest_iterations: u32,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            kdf: "PBKDF2-SHA256".into(),
            calibration_ms: 250,
            digest_iterations: 20_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Plaintext bytes per chunk, including the 4-byte length word (default: 65536)
    pub chunk_size: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self { chunk_size: 64 * 1024 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

/// Load the configuration file at `path`, falling back to defaults if it does not exist.
pub fn load_config(path: &Path) -> anyhow::Result<VmcryptConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        toml::from_str(&content).map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))
    } else {
        tracing::warn!(
            "config file not found: {}  (using defaults)",
            path.display()
        );
        Ok(VmcryptConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[keystore]
kdf = "PBKDF2-SHA512"
calibration_ms = 500
digest_iterations = 40000

[container]
chunk_size = 4096

[logging]
level = "debug"
format = "json"
"#;
        let config: VmcryptConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.keystore.kdf, "PBKDF2-SHA512");
        assert_eq!(config.keystore.calibration_ms, 500);
        assert_eq!(config.keystore.digest_iterations, 40000);
        assert_eq!(config.container.chunk_size, 4096);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_parse_defaults() {
        let config: VmcryptConfig = toml::from_str("").unwrap();

        assert_eq!(config.keystore.kdf, "PBKDF2-SHA256");
        assert_eq!(config.keystore.calibration_ms, 250);
        assert_eq!(config.keystore.digest_iterations, 20_000);
        assert_eq!(config.container.chunk_size, 65536);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[container]
chunk_size = 512
"#;
        let config: VmcryptConfig = toml::from_str(toml_str).unwrap();

        // Overridden
        assert_eq!(config.container.chunk_size, 512);
        // Defaults
        assert_eq!(config.keystore.calibration_ms, 250);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = VmcryptConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: VmcryptConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.keystore.kdf, parsed.keystore.kdf);
        assert_eq!(config.container.chunk_size, parsed.container.chunk_size);
        assert_eq!(config.logging.format, parsed.logging.format);
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vmcrypt.toml");
        std::fs::write(&path, "[keystore]\ncalibration_ms = 10\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.keystore.calibration_ms, 10);
        assert_eq!(config.keystore.digest_iterations, 20_000);
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.container.chunk_size, 65536);
    }

    #[test]
    fn test_load_config_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[keystore\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("parsing config"));
    }
}
