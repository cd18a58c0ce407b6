//! Cross-checks the recovery phrase codec against the reference `bip39`
//! implementation and exercises the phrase → key → field path end to end.

use coffre_core::CoffreError;
use coffre_crypto::mnemonic::wordlist;
use coffre_crypto::{decode, encode, Entropy, FieldCipher, MasterKey, OsEntropy, RecoveryPhrase};
use proptest::prelude::*;

proptest! {
    #[test]
    fn single_word_mutation_agrees_with_reference(
        bytes in any::<[u8; 16]>(),
        position in 0usize..12,
        replacement in 0usize..2048,
    ) {
        let phrase = encode(&Entropy::from_bytes(bytes));
        let mut words: Vec<&str> = phrase.words().to_vec();
        prop_assume!(words[position] != wordlist()[replacement]);
        words[position] = wordlist()[replacement];

        let ours = decode(&words);
        let reference = bip39::Mnemonic::parse_normalized(&words.join(" "));

        match (ours, reference) {
            (Ok(entropy), Ok(mnemonic)) => {
                prop_assert_eq!(entropy.as_bytes().to_vec(), mnemonic.to_entropy());
                prop_assert_ne!(entropy.as_bytes(), &bytes);
            }
            (Err(CoffreError::ChecksumMismatch), Err(bip39::Error::InvalidChecksum)) => {}
            (ours, reference) => {
                prop_assert!(false, "disagreement: ours={:?} reference={:?}", ours.err(), reference.err());
            }
        }
    }
}

#[test]
fn phrase_restores_derived_key_and_fields() {
    let entropy = Entropy::generate(&OsEntropy).unwrap();
    let phrase = encode(&entropy);
    let key = MasterKey::derive_from_entropy(&entropy).unwrap();
    let field = FieldCipher::with_os_entropy(key).encrypt("loyer janvier").unwrap();

    // Later, on a new device, from the transcribed words only
    let transcribed = phrase.to_string().to_uppercase();
    let restored = RecoveryPhrase::parse(&transcribed).unwrap();
    let restored_key = MasterKey::derive_from_entropy(restored.entropy()).unwrap();
    let plaintext = FieldCipher::with_os_entropy(restored_key).decrypt(&field).unwrap();

    assert_eq!(plaintext, "loyer janvier");
}
