use thiserror::Error;

pub type CoffreResult<T> = Result<T, CoffreError>;

/// Every failure the key-custody and field-encryption core can report.
///
/// Callers match on the variant to pick user messaging; none of these is
/// ever converted into an empty value on the way out.
#[derive(Debug, Error)]
pub enum CoffreError {
    #[error("secure entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("invalid recovery phrase: {0}")]
    InvalidPhraseFormat(#[from] PhraseFormatError),

    #[error("invalid recovery phrase: checksum mismatch")]
    ChecksumMismatch,

    #[error("no master key in secure storage")]
    KeyAbsent,

    #[error("stored master key is corrupt: {0}")]
    CorruptKeyMaterial(String),

    #[error("encrypted field failed authentication")]
    AuthenticationFailed,

    #[error("malformed encrypted field: {0}")]
    MalformedField(String),

    #[error("a master key is already installed on this device")]
    AlreadyInitialized,

    #[error("invalid device link payload: {0}")]
    InvalidLinkPayload(String),

    #[error("secure storage error: {0}")]
    StorageIo(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Why a phrase was rejected before its checksum could be checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhraseFormatError {
    #[error("expected 12 words, found {found}")]
    WordCount { found: usize },

    #[error("word {position} ('{word}') is not in the wordlist")]
    UnknownWord { position: usize, word: String },
}

impl CoffreError {
    /// True for failures the user can fix by re-entering the phrase.
    pub fn is_phrase_error(&self) -> bool {
        matches!(
            self,
            CoffreError::InvalidPhraseFormat(_) | CoffreError::ChecksumMismatch
        )
    }
}
