//! Secret store failures reach the caller unchanged and are attempted once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use coffre_core::{CoffreError, CoffreResult};
use coffre_secrets::{KeyCustody, SecretStore};
use secrecy::SecretString;

#[derive(Default)]
struct BrokenStore {
    calls: AtomicUsize,
}

impl SecretStore for BrokenStore {
    fn get(&self, _name: &str) -> CoffreResult<Option<SecretString>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CoffreError::StorageIo("keychain locked".into()))
    }

    fn set(&self, _name: &str, _value: &SecretString) -> CoffreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CoffreError::StorageIo("keychain locked".into()))
    }

    fn delete(&self, _name: &str) -> CoffreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CoffreError::StorageIo("keychain locked".into()))
    }
}

#[test]
fn store_failure_is_surfaced_once() {
    let store = Arc::new(BrokenStore::default());
    let custody = KeyCustody::with_os_entropy(store.clone());

    let key = custody.generate().unwrap();
    let err = custody.store(&key).unwrap_err();

    assert!(matches!(err, CoffreError::StorageIo(_)));
    assert_eq!(store.calls.load(Ordering::SeqCst), 1, "no silent retry");
}

#[test]
fn load_failure_is_not_reported_as_absent() {
    let custody = KeyCustody::with_os_entropy(Arc::new(BrokenStore::default()));

    assert!(matches!(custody.load().unwrap_err(), CoffreError::StorageIo(_)));
    assert!(matches!(custody.require().unwrap_err(), CoffreError::StorageIo(_)));
    assert!(matches!(
        custody.encrypt_field("note").unwrap_err(),
        CoffreError::StorageIo(_)
    ));
}
