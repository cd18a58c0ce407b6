//! coffre-secrets: master key custody
//!
//! The master key lives in exactly one slot of a [`SecretStore`]: the
//! platform keychain in production, process memory in tests. Only
//! [`KeyCustody`] touches that slot.
//!
//! Store layout (service = `coffre` by default):
//!   master_key            base64 of the 32-byte master key
//!   device_id             UUID minted at onboarding
//!   vault_id              UUID of the default vault
//!   onboarding_completed  "true" once onboarding finished

pub mod custody;
pub mod keychain;
pub mod store;

pub use custody::KeyCustody;
pub use keychain::KeyringStore;
pub use store::{open_store, MemoryStore, SecretStore};

/// Well-known secret store identifiers
pub mod keys {
    /// The master key (base64)
    pub const MASTER_KEY: &str = "master_key";
    /// This device's identifier
    pub const DEVICE_ID: &str = "device_id";
    /// The default vault identifier
    pub const VAULT_ID: &str = "vault_id";
    /// Set to "true" once onboarding has completed
    pub const ONBOARDING_COMPLETED: &str = "onboarding_completed";
}
