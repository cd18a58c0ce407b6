//! Master key custody: generation, persistence, and hand-off to the cipher.

use std::sync::Arc;

use coffre_core::{CoffreError, CoffreResult};
use coffre_crypto::{EncryptedField, EntropySource, FieldCipher, MasterKey, OsEntropy};

use crate::keys;
use crate::store::SecretStore;

/// Sole owner of the master key slot in the secret store.
///
/// The key only leaves custody inside a [`FieldCipher`]; nothing here logs
/// or returns key bytes to callers.
pub struct KeyCustody {
    secrets: Arc<dyn SecretStore>,
    entropy: Arc<dyn EntropySource>,
}

impl KeyCustody {
    pub fn new(secrets: Arc<dyn SecretStore>, entropy: Arc<dyn EntropySource>) -> Self {
        Self { secrets, entropy }
    }

    pub fn with_os_entropy(secrets: Arc<dyn SecretStore>) -> Self {
        Self::new(secrets, Arc::new(OsEntropy))
    }

    pub fn entropy(&self) -> &dyn EntropySource {
        self.entropy.as_ref()
    }

    /// Generate a fresh random master key. Does not store it.
    pub fn generate(&self) -> CoffreResult<MasterKey> {
        MasterKey::generate(self.entropy.as_ref())
    }

    /// Persist `key` in the master key slot, replacing whatever was there.
    pub fn store(&self, key: &MasterKey) -> CoffreResult<()> {
        self.secrets.set(keys::MASTER_KEY, &key.to_base64())?;
        tracing::info!("master key stored");
        Ok(())
    }

    /// The stored master key, or `None` if this device was never initialized.
    pub fn load(&self) -> CoffreResult<Option<MasterKey>> {
        match self.secrets.get(keys::MASTER_KEY)? {
            Some(encoded) => MasterKey::from_base64(&encoded).map(Some),
            None => Ok(None),
        }
    }

    /// The stored master key, or [`CoffreError::KeyAbsent`].
    pub fn require(&self) -> CoffreResult<MasterKey> {
        self.load()?.ok_or(CoffreError::KeyAbsent)
    }

    /// Remove the master key (rotation or device wipe). Fields encrypted
    /// under it become unreadable.
    pub fn destroy(&self) -> CoffreResult<()> {
        self.secrets.delete(keys::MASTER_KEY)?;
        tracing::warn!("master key destroyed");
        Ok(())
    }

    /// A cipher bound to the stored key.
    pub fn cipher(&self) -> CoffreResult<FieldCipher> {
        Ok(FieldCipher::new(self.require()?, Arc::clone(&self.entropy)))
    }

    /// Encrypt a sensitive field under the stored key.
    pub fn encrypt_field(&self, plaintext: &str) -> CoffreResult<EncryptedField> {
        self.cipher()?.encrypt(plaintext)
    }

    /// Decrypt a sensitive field under the stored key.
    pub fn decrypt_field(&self, field: &EncryptedField) -> CoffreResult<String> {
        self.cipher()?.decrypt(field)
    }
}

impl std::fmt::Debug for KeyCustody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCustody").finish_non_exhaustive()
    }
}
