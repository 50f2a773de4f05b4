pub mod config;
pub mod error;
pub mod logging;

pub use config::{load_config, VmcryptConfig};
pub use error::{CryptoError, CryptoResult};
