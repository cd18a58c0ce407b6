//! Key-value secret storage boundary

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use coffre_core::config::{KeystoreBackend, KeystoreConfig};
use coffre_core::{CoffreError, CoffreResult};
use secrecy::{ExposeSecret, SecretString};

use crate::keychain::KeyringStore;

/// get/set/delete over an OS-protected store, keyed by fixed identifiers.
///
/// Implementations surface every I/O failure as
/// [`CoffreError::StorageIo`] and never retry on their own.
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when nothing is stored under `name`.
    fn get(&self, name: &str) -> CoffreResult<Option<SecretString>>;

    fn set(&self, name: &str, value: &SecretString) -> CoffreResult<()>;

    /// Removing an absent entry is not an error.
    fn delete(&self, name: &str) -> CoffreResult<()>;
}

/// Open the store selected in the configuration.
pub fn open_store(config: &KeystoreConfig) -> CoffreResult<Arc<dyn SecretStore>> {
    match config.backend {
        KeystoreBackend::Keyring => {
            if !KeyringStore::is_available(&config.service) {
                return Err(CoffreError::StorageIo(
                    "platform keychain is not available".into(),
                ));
            }
            tracing::debug!(service = %config.service, "using platform keychain");
            Ok(Arc::new(KeyringStore::new(&config.service)))
        }
        KeystoreBackend::Memory => {
            tracing::warn!("using in-memory secret store; keys will not survive this process");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// In-process secret store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, SecretString>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for MemoryStore {
    fn get(&self, name: &str) -> CoffreResult<Option<SecretString>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| CoffreError::StorageIo("memory store lock poisoned".into()))?;
        Ok(entries
            .get(name)
            .map(|v| SecretString::from(v.expose_secret())))
    }

    fn set(&self, name: &str, value: &SecretString) -> CoffreResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CoffreError::StorageIo("memory store lock poisoned".into()))?;
        entries.insert(name.to_string(), SecretString::from(value.expose_secret()));
        Ok(())
    }

    fn delete(&self, name: &str) -> CoffreResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| CoffreError::StorageIo("memory store lock poisoned".into()))?;
        entries.remove(name);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.len())
            .finish()
    }
}
