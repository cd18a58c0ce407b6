//! coffre-crypto: field encryption and recovery material for coffre
//!
//! ```text
//! EntropySource (OS CSPRNG)
//!   ├── 16 bytes ─→ RecoveryPhrase (12 BIP-39 words, 4-bit SHA-256 checksum)
//!   │                 └── (derived lineage) HKDF-SHA256 ─→ MasterKey
//!   ├── 32 bytes ─→ MasterKey (independent lineage)
//!   └── 24 bytes ─→ nonce per field
//!                     └── XChaCha20-Poly1305(MasterKey) ─→ EncryptedField
//!                         base64( nonce ‖ ciphertext ‖ tag )
//! ```

pub mod entropy;
pub mod field;
pub mod key;
pub mod mnemonic;

pub use entropy::{Entropy, EntropySource, OsEntropy};
pub use field::{decrypt_field, encrypt_field, EncryptedField, FieldCipher};
pub use key::MasterKey;
pub use mnemonic::{decode, encode, RecoveryPhrase, WORDLIST_VERSION};

/// Size of a master key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the entropy behind a recovery phrase (128-bit)
pub const ENTROPY_SIZE: usize = 16;

/// Number of words in a recovery phrase
pub const WORD_COUNT: usize = 12;
