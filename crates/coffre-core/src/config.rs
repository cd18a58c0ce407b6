use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoffreError, CoffreResult};

/// Top-level configuration (loaded from coffre.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoffreConfig {
    pub keystore: KeystoreConfig,
    pub recovery: RecoveryConfig,
    pub logging: LoggingConfig,
}

/// Where the master key and device metadata live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoreConfig {
    /// Secret store backend (default: keyring)
    pub backend: KeystoreBackend,
    /// Service name the keychain entries are filed under (default: coffre)
    pub service: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeystoreBackend {
    /// Platform keychain (Keychain Services, Secret Service, Credential Manager)
    Keyring,
    /// Process memory only; everything is lost on exit
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// How the master key relates to the recovery phrase
    pub key_lineage: KeyLineage,
}

/// Relationship between the recovery phrase and the master key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyLineage {
    /// Master key is HKDF-derived from the phrase entropy, so the phrase
    /// alone restores it.
    #[default]
    Derived,
    /// Master key and phrase are independent random draws; the phrase only
    /// proves possession and the key must arrive over a device link.
    Independent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for KeystoreConfig {
    fn default() -> Self {
        Self {
            backend: KeystoreBackend::Keyring,
            service: "coffre".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl CoffreConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist. Reporting the fallback is left to the
    /// caller, which usually has not set up logging yet.
    pub fn load(path: &Path) -> CoffreResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoffreError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| CoffreError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
