//! Onboarding and restore orchestration

use std::sync::{Arc, Mutex, MutexGuard};

use coffre_core::{CoffreConfig, CoffreError, CoffreResult, DeviceId, KeyLineage, VaultId};
use coffre_crypto::{
    encode, Entropy, EntropySource, FieldCipher, MasterKey, OsEntropy, RecoveryPhrase,
};
use coffre_secrets::{keys, open_store, KeyCustody, SecretStore};
use secrecy::{ExposeSecret, SecretString};

use crate::link::DeviceLink;

/// What onboarding hands back to the caller for display.
///
/// The phrase is not persisted anywhere by coffre; once this value is
/// dropped the user's transcription is the only copy.
#[derive(Debug)]
pub struct OnboardingBundle {
    pub phrase: RecoveryPhrase,
    pub device_id: DeviceId,
    pub vault_id: VaultId,
}

/// Result of a successful [`RecoveryService::restore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The phrase-derived key was installed on this device.
    KeyInstalled,
    /// The phrase-derived key was already the installed key.
    KeyAlreadyPresent,
    /// The phrase is valid, but under the independent lineage it cannot
    /// regenerate the key; the key must come from a linked device.
    PhraseVerified,
}

/// Orchestrates entropy, phrase codec, and key custody.
///
/// Onboarding and restore are serialized through one in-process guard, so
/// two concurrent attempts can never both generate and write a key. The
/// guard belongs to this instance: open exactly one service per secret
/// store and share it (`Arc<RecoveryService>`) between threads. Callers
/// only get read access to the master key slot, through [`Self::cipher`]
/// and [`Self::has_master_key`].
///
/// A failed onboarding or restore removes whatever it already wrote,
/// master key first, so a retry starts from a clean device.
pub struct RecoveryService {
    custody: KeyCustody,
    secrets: Arc<dyn SecretStore>,
    lineage: KeyLineage,
    writer: Mutex<()>,
}

impl RecoveryService {
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        entropy: Arc<dyn EntropySource>,
        lineage: KeyLineage,
    ) -> Self {
        Self {
            custody: KeyCustody::new(Arc::clone(&secrets), entropy),
            secrets,
            lineage,
            writer: Mutex::new(()),
        }
    }

    /// Build the service from configuration, backed by the OS CSPRNG.
    pub fn from_config(config: &CoffreConfig) -> CoffreResult<Self> {
        let secrets = open_store(&config.keystore)?;
        Ok(Self::new(
            secrets,
            Arc::new(OsEntropy),
            config.recovery.key_lineage,
        ))
    }

    /// A field cipher bound to the installed master key, or
    /// [`CoffreError::KeyAbsent`].
    pub fn cipher(&self) -> CoffreResult<FieldCipher> {
        self.custody.cipher()
    }

    pub fn has_master_key(&self) -> CoffreResult<bool> {
        Ok(self.custody.load()?.is_some())
    }

    pub fn lineage(&self) -> KeyLineage {
        self.lineage
    }

    /// First-run setup: issue a recovery phrase, install a master key, and
    /// mint the device and vault identifiers.
    ///
    /// Fails with [`CoffreError::AlreadyInitialized`] if a key is present.
    pub fn generate_onboarding(&self) -> CoffreResult<OnboardingBundle> {
        let _writer = self.lock_writer();

        if self.custody.load()?.is_some() {
            return Err(CoffreError::AlreadyInitialized);
        }

        let entropy = Entropy::generate(self.custody.entropy())?;
        let phrase = encode(&entropy);
        let key = match self.lineage {
            KeyLineage::Derived => MasterKey::derive_from_entropy(&entropy)?,
            KeyLineage::Independent => self.custody.generate()?,
        };

        let device_id = DeviceId::generate();
        let vault_id = VaultId::generate();
        let mut written = Vec::new();
        let installed = self
            .put_tracked(&mut written, keys::DEVICE_ID, &device_id.to_string())
            .and_then(|()| self.put_tracked(&mut written, keys::VAULT_ID, &vault_id.to_string()))
            .and_then(|()| self.store_key_tracked(&mut written, &key))
            .and_then(|()| self.put_tracked(&mut written, keys::ONBOARDING_COMPLETED, "true"));
        if let Err(e) = installed {
            self.roll_back(&written, "onboarding");
            return Err(e);
        }

        tracing::info!(
            device_id = %device_id,
            vault_id = %vault_id,
            lineage = ?self.lineage,
            "onboarding complete"
        );

        Ok(OnboardingBundle {
            phrase,
            device_id,
            vault_id,
        })
    }

    /// Validate a transcribed phrase without touching storage.
    pub fn verify(&self, phrase: &str) -> CoffreResult<RecoveryPhrase> {
        RecoveryPhrase::parse(phrase)
    }

    /// Recover this device from a whitespace-joined 12-word phrase.
    ///
    /// Under the derived lineage the key is re-derived and installed; a
    /// different key already on the device is left alone and reported as
    /// [`CoffreError::AlreadyInitialized`]. Under the independent lineage
    /// the phrase is only verified.
    pub fn restore(&self, phrase: &str) -> CoffreResult<RestoreOutcome> {
        let phrase = RecoveryPhrase::parse(phrase)?;

        if self.lineage == KeyLineage::Independent {
            tracing::info!("recovery phrase verified; master key must arrive over a device link");
            return Ok(RestoreOutcome::PhraseVerified);
        }

        let _writer = self.lock_writer();
        let key = MasterKey::derive_from_entropy(phrase.entropy())?;

        match self.custody.load()? {
            Some(existing) if existing.ct_eq(&key) => {
                tracing::info!("recovery phrase matches the installed master key");
                Ok(RestoreOutcome::KeyAlreadyPresent)
            }
            Some(_) => Err(CoffreError::AlreadyInitialized),
            None => {
                let mut written = Vec::new();
                let installed = self.device_id().and_then(|existing| match existing {
                    Some(_) => Ok(()),
                    None => self.put_tracked(
                        &mut written,
                        keys::DEVICE_ID,
                        &DeviceId::generate().to_string(),
                    ),
                });
                let installed = installed
                    .and_then(|()| self.store_key_tracked(&mut written, &key))
                    .and_then(|()| {
                        self.put_tracked(&mut written, keys::ONBOARDING_COMPLETED, "true")
                    });
                if let Err(e) = installed {
                    self.roll_back(&written, "restore");
                    return Err(e);
                }
                tracing::info!("master key restored from recovery phrase");
                Ok(RestoreOutcome::KeyInstalled)
            }
        }
    }

    pub fn is_onboarding_completed(&self) -> CoffreResult<bool> {
        Ok(self
            .secrets
            .get(keys::ONBOARDING_COMPLETED)?
            .is_some_and(|v| v.expose_secret() == "true"))
    }

    pub fn device_id(&self) -> CoffreResult<Option<DeviceId>> {
        self.get_parsed(keys::DEVICE_ID)
    }

    pub fn vault_id(&self) -> CoffreResult<Option<VaultId>> {
        self.get_parsed(keys::VAULT_ID)
    }

    /// Link payload advertising this device and its vault.
    pub fn device_link(&self) -> CoffreResult<DeviceLink> {
        match (self.device_id()?, self.vault_id()?) {
            (Some(device_id), Some(vault_id)) => Ok(DeviceLink::new(device_id, vault_id)),
            _ => Err(CoffreError::InvalidLinkPayload(
                "device has no device or vault id; run onboarding first".into(),
            )),
        }
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        // The guard protects no data, so a panic in another holder leaves
        // nothing inconsistent behind.
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn put_tracked(
        &self,
        written: &mut Vec<&'static str>,
        name: &'static str,
        value: &str,
    ) -> CoffreResult<()> {
        self.secrets.set(name, &SecretString::from(value))?;
        written.push(name);
        Ok(())
    }

    fn store_key_tracked(
        &self,
        written: &mut Vec<&'static str>,
        key: &MasterKey,
    ) -> CoffreResult<()> {
        self.custody.store(key)?;
        written.push(keys::MASTER_KEY);
        Ok(())
    }

    /// Best-effort removal of the slots a failed sequence wrote, newest
    /// first. The master key is always written after the identifiers, so
    /// it goes before them. Cleanup failures are logged, never returned.
    fn roll_back(&self, written: &[&'static str], operation: &str) {
        for &name in written.iter().rev() {
            let removed = if name == keys::MASTER_KEY {
                self.custody.destroy()
            } else {
                self.secrets.delete(name)
            };
            if let Err(e) = removed {
                tracing::error!(operation, slot = name, "rollback failed: {e}");
            }
        }
        if !written.is_empty() {
            tracing::warn!(operation, slots = written.len(), "rolled back partial write");
        }
    }

    fn get_parsed<T>(&self, name: &str) -> CoffreResult<Option<T>>
    where
        T: std::str::FromStr<Err = CoffreError>,
    {
        self.secrets
            .get(name)?
            .map(|v| v.expose_secret().parse())
            .transpose()
    }
}

impl std::fmt::Debug for RecoveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryService")
            .field("lineage", &self.lineage)
            .finish_non_exhaustive()
    }
}
