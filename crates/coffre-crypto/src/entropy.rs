//! Cryptographically secure randomness.
//!
//! Every random byte in coffre (phrase entropy, master keys, nonces) comes
//! through an [`EntropySource`]. The production source reads the operating
//! system CSPRNG directly and reports failure instead of falling back to a
//! userspace generator.

use coffre_core::{CoffreError, CoffreResult};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::ENTROPY_SIZE;

/// A source of cryptographically secure random bytes.
pub trait EntropySource: Send + Sync {
    /// Fill `dest` entirely with random bytes, or fail with
    /// [`CoffreError::EntropyUnavailable`].
    fn fill(&self, dest: &mut [u8]) -> CoffreResult<()>;

    /// Draw `n` random bytes. The buffer is wiped when dropped.
    fn random_bytes(&self, n: usize) -> CoffreResult<Zeroizing<Vec<u8>>> {
        let mut buf = Zeroizing::new(vec![0u8; n]);
        self.fill(&mut buf)?;
        Ok(buf)
    }
}

/// The operating system CSPRNG (`getrandom` underneath).
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, dest: &mut [u8]) -> CoffreResult<()> {
        let requested = dest.len();
        OsRng.try_fill_bytes(dest).map_err(|e| {
            tracing::error!(requested, "OS entropy source failed: {e}");
            CoffreError::EntropyUnavailable(e.to_string())
        })
    }
}

/// 128 bits of recovery entropy. Zeroized on drop; compared in constant time.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Entropy([u8; ENTROPY_SIZE]);

impl Entropy {
    pub fn from_bytes(bytes: [u8; ENTROPY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ENTROPY_SIZE] {
        &self.0
    }

    /// Draw fresh entropy from `source`.
    pub fn generate(source: &dyn EntropySource) -> CoffreResult<Self> {
        let mut bytes = [0u8; ENTROPY_SIZE];
        if let Err(e) = source.fill(&mut bytes) {
            bytes.zeroize();
            return Err(e);
        }
        Ok(Self(bytes))
    }
}

impl PartialEq for Entropy {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for Entropy {}

impl std::fmt::Debug for Entropy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Entropy").field(&"[REDACTED]").finish()
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedEntropy;

#[cfg(any(test, feature = "test-util"))]
mod scripted {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed byte script, then reports the source as exhausted.
    ///
    /// Test fixtures only: it lets a test pin the phrase, key, or nonce a
    /// component will draw, and simulate an unavailable entropy source.
    #[derive(Debug, Default)]
    pub struct ScriptedEntropy {
        script: Mutex<VecDeque<u8>>,
    }

    impl ScriptedEntropy {
        pub fn new(bytes: impl IntoIterator<Item = u8>) -> Self {
            Self {
                script: Mutex::new(bytes.into_iter().collect()),
            }
        }

        /// A source that fails on every draw.
        pub fn exhausted() -> Self {
            Self::default()
        }

        pub fn remaining(&self) -> usize {
            self.script.lock().map(|s| s.len()).unwrap_or(0)
        }
    }

    impl EntropySource for ScriptedEntropy {
        fn fill(&self, dest: &mut [u8]) -> CoffreResult<()> {
            let mut script = self
                .script
                .lock()
                .map_err(|_| CoffreError::EntropyUnavailable("script lock poisoned".into()))?;
            let requested = dest.len();
            if script.len() < requested {
                return Err(CoffreError::EntropyUnavailable(format!(
                    "scripted entropy exhausted: {} bytes left, {requested} requested",
                    script.len(),
                )));
            }
            for (slot, byte) in dest.iter_mut().zip(script.drain(..requested)) {
                *slot = byte;
            }
            Ok(())
        }
    }
}
