//! 12-word recovery phrases (BIP-39 encoding of 128-bit entropy)
//!
//! Layout, most-significant bit first:
//! ```text
//! [128 bits: entropy][4 bits: SHA-256(entropy)[0] >> 4]  = 132 bits
//!  └──────── 12 groups of 11 bits, each an index into the wordlist ────────┘
//! ```
//!
//! The wordlist is the BIP-39 English list. Its index-to-word mapping must
//! never change: every phrase already handed to a user depends on it.

use bip39::Language;
use coffre_core::{CoffreError, CoffreResult, PhraseFormatError};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::entropy::Entropy;
use crate::{ENTROPY_SIZE, WORD_COUNT};

/// Identifies the vocabulary phrases are issued against.
pub const WORDLIST_VERSION: &str = "bip39-english-v1";

const BITS_PER_WORD: usize = 11;

/// Entropy plus one trailing byte whose high nibble carries the checksum.
const PACKED_SIZE: usize = ENTROPY_SIZE + 1;

/// The fixed, ordered 2048-word vocabulary.
pub fn wordlist() -> &'static [&'static str; 2048] {
    Language::English.word_list()
}

/// Index of `word` in the wordlist, ignoring case.
pub fn word_index(word: &str) -> Option<u16> {
    Language::English.find_word(&word.to_lowercase())
}

/// A validated 12-word recovery phrase.
///
/// Holding one means the checksum verified; the words are canonical
/// lowercase wordlist entries in their original order.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveryPhrase {
    words: [&'static str; WORD_COUNT],
    entropy: Entropy,
}

impl RecoveryPhrase {
    /// Parse a whitespace-separated phrase, validating word count, wordlist
    /// membership, and checksum.
    pub fn parse(phrase: &str) -> CoffreResult<Self> {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        let entropy = decode(&words)?;
        Ok(encode(&entropy))
    }

    pub fn words(&self) -> &[&'static str; WORD_COUNT] {
        &self.words
    }

    /// The entropy this phrase encodes.
    pub fn entropy(&self) -> &Entropy {
        &self.entropy
    }
}

impl std::fmt::Display for RecoveryPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.words.join(" "))
    }
}

impl std::fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryPhrase")
            .field("words", &"[REDACTED]")
            .finish()
    }
}

impl std::str::FromStr for RecoveryPhrase {
    type Err = CoffreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Encode 128 bits of entropy as a 12-word phrase.
pub fn encode(entropy: &Entropy) -> RecoveryPhrase {
    let mut packed = Zeroizing::new([0u8; PACKED_SIZE]);
    packed[..ENTROPY_SIZE].copy_from_slice(entropy.as_bytes());
    packed[ENTROPY_SIZE] = checksum_nibble(entropy.as_bytes()) << 4;

    let list = wordlist();
    let words = std::array::from_fn(|group| list[usize::from(read_group(&packed[..], group))]);

    RecoveryPhrase {
        words,
        entropy: entropy.clone(),
    }
}

/// Decode a 12-word phrase back to its entropy.
///
/// Fails with [`PhraseFormatError::WordCount`] or
/// [`PhraseFormatError::UnknownWord`] before looking at the checksum, and
/// with [`CoffreError::ChecksumMismatch`] when every word is known but the
/// trailing 4 bits disagree with SHA-256 of the reconstructed entropy.
pub fn decode<S: AsRef<str>>(words: &[S]) -> CoffreResult<Entropy> {
    if words.len() != WORD_COUNT {
        return Err(PhraseFormatError::WordCount { found: words.len() }.into());
    }

    let mut packed = Zeroizing::new([0u8; PACKED_SIZE]);
    for (group, word) in words.iter().enumerate() {
        let word = word.as_ref();
        let index = word_index(word).ok_or_else(|| PhraseFormatError::UnknownWord {
            position: group + 1,
            word: word.to_string(),
        })?;
        write_group(&mut packed[..], group, index);
    }

    let mut bytes = [0u8; ENTROPY_SIZE];
    bytes.copy_from_slice(&packed[..ENTROPY_SIZE]);
    let entropy = Entropy::from_bytes(bytes);

    let carried = packed[ENTROPY_SIZE] >> 4;
    if carried != checksum_nibble(entropy.as_bytes()) {
        tracing::debug!("recovery phrase rejected: checksum mismatch");
        return Err(CoffreError::ChecksumMismatch);
    }

    Ok(entropy)
}

/// Top 4 bits of SHA-256 over the entropy.
fn checksum_nibble(entropy: &[u8; ENTROPY_SIZE]) -> u8 {
    Sha256::digest(entropy)[0] >> 4
}

/// Read the 11-bit group at `group` (MSB-first) from `buf`.
fn read_group(buf: &[u8], group: usize) -> u16 {
    (0..BITS_PER_WORD).fold(0u16, |acc, offset| {
        let bit = group * BITS_PER_WORD + offset;
        (acc << 1) | u16::from((buf[bit / 8] >> (7 - bit % 8)) & 1)
    })
}

/// Write `index` as the 11-bit group at `group` (MSB-first) into `buf`.
fn write_group(buf: &mut [u8], group: usize, index: u16) {
    for offset in 0..BITS_PER_WORD {
        if (index >> (BITS_PER_WORD - 1 - offset)) & 1 == 1 {
            let bit = group * BITS_PER_WORD + offset;
            buf[bit / 8] |= 1 << (7 - bit % 8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ZERO_PHRASE: &str = "abandon abandon abandon abandon abandon abandon \
                               abandon abandon abandon abandon abandon about";

    fn zero_words() -> Vec<&'static str> {
        ZERO_PHRASE.split_whitespace().collect()
    }

    #[test]
    fn test_zero_entropy_golden_phrase() {
        let phrase = encode(&Entropy::from_bytes([0u8; ENTROPY_SIZE]));
        assert_eq!(phrase.to_string(), zero_words().join(" "));
        // Same input, same words, every time
        let again = encode(&Entropy::from_bytes([0u8; ENTROPY_SIZE]));
        assert_eq!(phrase, again);
    }

    #[test]
    fn test_known_vectors() {
        let vectors: [([u8; ENTROPY_SIZE], &str); 4] = [
            (
                [0x7f; ENTROPY_SIZE],
                "legal winner thank year wave sausage worth useful legal winner thank yellow",
            ),
            (
                [0x80; ENTROPY_SIZE],
                "letter advice cage absurd amount doctor acoustic avoid letter advice cage above",
            ),
            ([0xff; ENTROPY_SIZE], "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong"),
            (
                [
                    0x9e, 0x88, 0x5d, 0x95, 0x2a, 0xd3, 0x62, 0xca, 0xeb, 0x4e, 0xfe, 0x34, 0xa8,
                    0xe9, 0x1b, 0xd2,
                ],
                "ozone drill grab fiber curtain grace pudding thank cruise elder eight picnic",
            ),
        ];

        for (bytes, expected) in vectors {
            let phrase = encode(&Entropy::from_bytes(bytes));
            assert_eq!(phrase.to_string(), expected);

            let words: Vec<&str> = expected.split(' ').collect();
            assert_eq!(decode(&words).unwrap().as_bytes(), &bytes);
        }
    }

    #[test]
    fn test_decode_case_insensitive() {
        let upper: Vec<String> = zero_words().iter().map(|w| w.to_uppercase()).collect();
        let entropy = decode(&upper).unwrap();
        assert_eq!(entropy.as_bytes(), &[0u8; ENTROPY_SIZE]);
    }

    #[test]
    fn test_parse_canonicalizes() {
        let messy = "  Abandon abandon\tabandon abandon abandon abandon\n\
                     abandon abandon abandon abandon ABANDON About ";
        let phrase = RecoveryPhrase::parse(messy).unwrap();
        assert_eq!(phrase.to_string(), zero_words().join(" "));
        assert_eq!(phrase.entropy().as_bytes(), &[0u8; ENTROPY_SIZE]);
    }

    #[test]
    fn test_eleven_words_rejected() {
        let words = zero_words();
        let err = decode(&words[..11]).unwrap_err();
        assert!(matches!(
            err,
            CoffreError::InvalidPhraseFormat(PhraseFormatError::WordCount { found: 11 })
        ));
    }

    #[test]
    fn test_thirteen_words_rejected() {
        let mut words = zero_words();
        words.push("abandon");
        let err = decode(&words).unwrap_err();
        assert!(matches!(
            err,
            CoffreError::InvalidPhraseFormat(PhraseFormatError::WordCount { found: 13 })
        ));
    }

    #[test]
    fn test_empty_phrase_rejected() {
        let err = RecoveryPhrase::parse("   ").unwrap_err();
        assert!(matches!(
            err,
            CoffreError::InvalidPhraseFormat(PhraseFormatError::WordCount { found: 0 })
        ));
    }

    #[test]
    fn test_unknown_word_rejected() {
        let mut words = zero_words();
        words[4] = "bitcoin";
        let err = decode(&words).unwrap_err();
        match err {
            CoffreError::InvalidPhraseFormat(PhraseFormatError::UnknownWord { position, word }) => {
                assert_eq!(position, 5);
                assert_eq!(word, "bitcoin");
            }
            other => panic!("expected unknown word, got {other:?}"),
        }
    }

    #[test]
    fn test_checksum_mismatch() {
        // "abandon" x12 is all-zero entropy with a zero checksum, but
        // SHA-256 of zero entropy starts with 0x37, so the nibble must be 3.
        let words = vec!["abandon"; WORD_COUNT];
        let err = decode(&words).unwrap_err();
        assert!(matches!(err, CoffreError::ChecksumMismatch));
    }

    #[test]
    fn test_single_word_mutation_never_silently_restores() {
        // Replace the first word with every other wordlist entry. A mutation
        // either fails the checksum or decodes to different entropy; only a
        // small fraction (about 1 in 16) can pass the 4-bit checksum.
        let original = zero_words();
        let mut accepted = 0;
        for candidate in wordlist().iter().filter(|w| **w != original[0]) {
            let mut words = original.clone();
            words[0] = *candidate;
            match decode(&words) {
                Ok(entropy) => {
                    accepted += 1;
                    assert_ne!(entropy.as_bytes(), &[0u8; ENTROPY_SIZE]);
                }
                Err(e) => assert!(matches!(e, CoffreError::ChecksumMismatch)),
            }
        }
        assert!(accepted < 2047 / 4, "checksum accepted {accepted} mutations");
    }

    #[test]
    fn test_wordlist_shape() {
        let list = wordlist();
        assert_eq!(list.len(), 2048);
        assert_eq!(list[0], "abandon");
        assert_eq!(list[2047], "zoo");
        assert_eq!(word_index("ZOO"), Some(2047));
        assert_eq!(word_index("zebra-stripe"), None);
    }

    #[test]
    fn test_debug_is_redacted() {
        let phrase = encode(&Entropy::from_bytes([0u8; ENTROPY_SIZE]));
        assert!(!format!("{phrase:?}").contains("abandon"));
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(bytes in any::<[u8; ENTROPY_SIZE]>()) {
            let phrase = encode(&Entropy::from_bytes(bytes));
            prop_assert_eq!(phrase.words().len(), WORD_COUNT);
            let decoded = decode(&phrase.words()[..]).unwrap();
            prop_assert_eq!(decoded.as_bytes(), &bytes);
        }

        #[test]
        fn encoded_phrase_parses(bytes in any::<[u8; ENTROPY_SIZE]>()) {
            let phrase = encode(&Entropy::from_bytes(bytes));
            let parsed = RecoveryPhrase::parse(&phrase.to_string()).unwrap();
            prop_assert_eq!(parsed, phrase);
        }

        #[test]
        fn matches_reference_bip39(bytes in any::<[u8; ENTROPY_SIZE]>()) {
            let reference = bip39::Mnemonic::from_entropy(&bytes).unwrap();
            let phrase = encode(&Entropy::from_bytes(bytes));
            prop_assert_eq!(phrase.to_string(), reference.to_string());
        }
    }
}
