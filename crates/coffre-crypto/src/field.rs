//! Per-field XChaCha20-Poly1305 encryption/decryption
//!
//! Encrypted field format (base64, standard alphabet, padded):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! ```
//!
//! A fresh nonce is drawn for every call, so encrypting the same note twice
//! under the same key yields two unrelated blobs. Decryption never returns
//! a partial or empty plaintext in place of an error.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use coffre_core::{CoffreError, CoffreResult};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::entropy::{EntropySource, OsEntropy};
use crate::key::MasterKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// A sensitive column value that has been through [`encrypt_field`].
///
/// Only produced by encryption or by [`EncryptedField::parse`], which checks
/// the framing; a plain string cannot be passed where one is expected.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncryptedField(String);

impl EncryptedField {
    /// Accept a stored blob after checking it is base64 and long enough to
    /// hold a nonce and a tag. Authenticity is only established by decrypt.
    pub fn parse(encoded: impl Into<String>) -> CoffreResult<Self> {
        let encoded = encoded.into();
        decode_frame(&encoded)?;
        Ok(Self(encoded))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for EncryptedField {
    type Error = CoffreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EncryptedField> for String {
    fn from(field: EncryptedField) -> Self {
        field.0
    }
}

impl std::fmt::Display for EncryptedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for EncryptedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EncryptedField")
            .field(&format_args!("{} chars", self.0.len()))
            .finish()
    }
}

/// Encrypt a single string field with XChaCha20-Poly1305.
///
/// - `key`: the device master key
/// - `plaintext`: the field value (UTF-8)
/// - `entropy`: source of the 24-byte nonce
///
/// Returns: base64 of `[24-byte nonce][ciphertext][16-byte tag]`
pub fn encrypt_field(
    key: &MasterKey,
    plaintext: &str,
    entropy: &dyn EntropySource,
) -> CoffreResult<EncryptedField> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    entropy.fill(&mut nonce_bytes)?;
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| CoffreError::MalformedField(format!("field encryption failed: {e}")))?;

    let mut framed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    framed.extend_from_slice(&nonce_bytes);
    framed.extend_from_slice(&ciphertext);
    Ok(EncryptedField(STANDARD.encode(&framed)))
}

/// Decrypt a single string field with XChaCha20-Poly1305.
///
/// Fails with [`CoffreError::AuthenticationFailed`] if the tag does not
/// verify (wrong key or any modified byte) and with
/// [`CoffreError::MalformedField`] if the plaintext is not UTF-8.
pub fn decrypt_field(key: &MasterKey, field: &EncryptedField) -> CoffreResult<String> {
    let framed = decode_frame(field.as_str())?;

    let (nonce_bytes, ciphertext) = framed.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| {
        tracing::debug!(len = framed.len(), "encrypted field failed authentication");
        CoffreError::AuthenticationFailed
    })?;

    String::from_utf8(plaintext).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        CoffreError::MalformedField("decrypted field is not UTF-8".into())
    })
}

/// Base64-decode and length-check a framed field.
fn decode_frame(encoded: &str) -> CoffreResult<Vec<u8>> {
    let framed = STANDARD
        .decode(encoded)
        .map_err(|e| CoffreError::MalformedField(format!("base64 decode: {e}")))?;
    if framed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CoffreError::MalformedField(format!(
            "encrypted field too short: {} bytes (minimum {})",
            framed.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }
    Ok(framed)
}

/// Field cipher bound to a loaded master key.
///
/// Stateless apart from the key, so one instance can serve concurrent
/// readers and writers.
pub struct FieldCipher {
    key: MasterKey,
    entropy: Arc<dyn EntropySource>,
}

impl FieldCipher {
    pub fn new(key: MasterKey, entropy: Arc<dyn EntropySource>) -> Self {
        Self { key, entropy }
    }

    /// Cipher drawing nonces from the OS CSPRNG.
    pub fn with_os_entropy(key: MasterKey) -> Self {
        Self::new(key, Arc::new(OsEntropy))
    }

    pub fn encrypt(&self, plaintext: &str) -> CoffreResult<EncryptedField> {
        encrypt_field(&self.key, plaintext, self.entropy.as_ref())
    }

    pub fn decrypt(&self, field: &EncryptedField) -> CoffreResult<String> {
        decrypt_field(&self.key, field)
    }
}

impl std::fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}
