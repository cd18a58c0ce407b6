//! Platform keychain backend for the secret store.
//!
//! Uses the `keyring` crate for cross-platform access:
//! - macOS / iOS: Keychain Services
//! - Linux: GNOME Keyring / Secret Service (D-Bus)
//! - Windows: Credential Manager

use coffre_core::{CoffreError, CoffreResult};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::store::SecretStore;

/// Secrets filed under one keychain service name.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Check if the platform keychain is available.
    pub fn is_available(service: &str) -> bool {
        keyring::Entry::new(service, "__coffre_probe__").is_ok()
    }

    fn entry(&self, name: &str) -> CoffreResult<keyring::Entry> {
        keyring::Entry::new(&self.service, name)
            .map_err(|e| CoffreError::StorageIo(format!("keychain entry creation: {e}")))
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, name: &str) -> CoffreResult<Option<SecretString>> {
        match self.entry(name)?.get_password() {
            Ok(mut password) => {
                let secret = SecretString::from(password.as_str());
                password.zeroize();
                Ok(Some(secret))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CoffreError::StorageIo(format!("keychain get for '{name}': {e}"))),
        }
    }

    fn set(&self, name: &str, value: &SecretString) -> CoffreResult<()> {
        self.entry(name)?
            .set_password(value.expose_secret())
            .map_err(|e| CoffreError::StorageIo(format!("keychain store for '{name}': {e}")))?;
        tracing::debug!(service = %self.service, key = name, "stored secret in platform keychain");
        Ok(())
    }

    fn delete(&self, name: &str) -> CoffreResult<()> {
        match self.entry(name)?.delete_credential() {
            Ok(()) => {
                tracing::debug!(service = %self.service, key = name, "deleted secret from platform keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()), // already deleted
            Err(e) => Err(CoffreError::StorageIo(format!("keychain delete for '{name}': {e}"))),
        }
    }
}
