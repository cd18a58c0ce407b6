pub mod config;
pub mod error;
pub mod types;

pub use config::{CoffreConfig, KeyLineage, KeystoreBackend};
pub use error::{CoffreError, CoffreResult, PhraseFormatError};
pub use types::{DeviceId, VaultId};
