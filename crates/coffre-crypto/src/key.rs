//! Master key material: generation, phrase-derived lineage, storage encoding

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use coffre_core::{CoffreError, CoffreResult};
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, Zeroizing};

use crate::entropy::{Entropy, EntropySource};
use crate::KEY_SIZE;

/// HKDF info string binding a phrase-derived key to its purpose and version.
const MASTER_KEY_INFO: &[u8] = b"coffre-master-key-v1";

/// The 256-bit device master key.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generate a fresh random master key.
    pub fn generate(source: &dyn EntropySource) -> CoffreResult<Self> {
        let mut bytes = [0u8; KEY_SIZE];
        if let Err(e) = source.fill(&mut bytes) {
            bytes.zeroize();
            return Err(e);
        }
        Ok(Self { bytes })
    }

    /// Derive the master key from recovery-phrase entropy via HKDF-SHA256.
    ///
    /// Deterministic: the same phrase always yields the same key.
    pub fn derive_from_entropy(entropy: &Entropy) -> CoffreResult<Self> {
        let hkdf = Hkdf::<Sha256>::new(None, entropy.as_bytes());
        let mut okm = [0u8; KEY_SIZE];
        hkdf.expand(MASTER_KEY_INFO, &mut okm).map_err(|e| {
            okm.zeroize();
            CoffreError::CorruptKeyMaterial(format!("HKDF expand failed: {e}"))
        })?;
        Ok(Self { bytes: okm })
    }

    /// Encode for the secret store (standard base64).
    pub fn to_base64(&self) -> SecretString {
        let encoded = Zeroizing::new(STANDARD.encode(&self.bytes));
        SecretString::from(encoded.as_str())
    }

    /// Decode a stored value. Anything other than base64 of exactly
    /// 32 bytes is corrupt key material.
    pub fn from_base64(encoded: &SecretString) -> CoffreResult<Self> {
        let decoded = Zeroizing::new(
            STANDARD
                .decode(encoded.expose_secret().trim())
                .map_err(|e| CoffreError::CorruptKeyMaterial(format!("base64 decode: {e}")))?,
        );
        if decoded.len() != KEY_SIZE {
            return Err(CoffreError::CorruptKeyMaterial(format!(
                "expected {KEY_SIZE} bytes, found {}",
                decoded.len()
            )));
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }

    /// Constant-time equality.
    pub fn ct_eq(&self, other: &MasterKey) -> bool {
        self.bytes[..].ct_eq(&other.bytes[..]).into()
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
