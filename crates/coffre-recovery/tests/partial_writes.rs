//! A storage failure partway through onboarding or restore leaves the
//! device as it was, so the user can simply try again.

use std::sync::{Arc, Mutex};

use coffre_core::{CoffreError, CoffreResult, KeyLineage};
use coffre_crypto::OsEntropy;
use coffre_recovery::{RecoveryService, RestoreOutcome};
use coffre_secrets::{keys, MemoryStore, SecretStore};
use secrecy::SecretString;

/// Memory store that refuses writes to one slot, and optionally all deletes.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_set: Mutex<Option<&'static str>>,
    fail_delete: Mutex<bool>,
}

impl FlakyStore {
    fn failing_on(slot: &'static str) -> Self {
        let store = Self::default();
        *store.fail_set.lock().unwrap() = Some(slot);
        store
    }

    fn heal(&self) {
        *self.fail_set.lock().unwrap() = None;
        *self.fail_delete.lock().unwrap() = false;
    }
}

impl SecretStore for FlakyStore {
    fn get(&self, name: &str) -> CoffreResult<Option<SecretString>> {
        self.inner.get(name)
    }

    fn set(&self, name: &str, value: &SecretString) -> CoffreResult<()> {
        if *self.fail_set.lock().unwrap() == Some(name) {
            return Err(CoffreError::StorageIo(format!("write to {name} refused")));
        }
        self.inner.set(name, value)
    }

    fn delete(&self, name: &str) -> CoffreResult<()> {
        if *self.fail_delete.lock().unwrap() {
            return Err(CoffreError::StorageIo(format!("delete of {name} refused")));
        }
        self.inner.delete(name)
    }
}

fn service_over(store: &Arc<FlakyStore>) -> RecoveryService {
    RecoveryService::new(store.clone(), Arc::new(OsEntropy), KeyLineage::Derived)
}

#[test]
fn failed_completion_flag_removes_key_and_ids() {
    let store = Arc::new(FlakyStore::failing_on(keys::ONBOARDING_COMPLETED));
    let service = service_over(&store);

    let err = service.generate_onboarding().unwrap_err();
    assert!(matches!(err, CoffreError::StorageIo(_)));

    assert!(!service.has_master_key().unwrap());
    assert!(service.device_id().unwrap().is_none());
    assert!(service.vault_id().unwrap().is_none());
    assert!(!service.is_onboarding_completed().unwrap());
    assert!(store.inner.is_empty());

    // Once storage recovers, onboarding starts over cleanly.
    store.heal();
    let bundle = service.generate_onboarding().unwrap();
    assert!(service.is_onboarding_completed().unwrap());
    assert_eq!(service.device_id().unwrap(), Some(bundle.device_id));

    let fresh = RecoveryService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(OsEntropy),
        KeyLineage::Derived,
    );
    fresh.restore(&bundle.phrase.to_string()).unwrap();
    let field = service.cipher().unwrap().encrypt("premier loyer").unwrap();
    assert_eq!(fresh.cipher().unwrap().decrypt(&field).unwrap(), "premier loyer");
}

#[test]
fn failed_key_write_removes_ids() {
    let store = Arc::new(FlakyStore::failing_on(keys::MASTER_KEY));
    let service = service_over(&store);

    assert!(matches!(
        service.generate_onboarding().unwrap_err(),
        CoffreError::StorageIo(_)
    ));
    assert!(store.inner.is_empty());
}

#[test]
fn failed_rollback_still_reports_original_error() {
    let store = Arc::new(FlakyStore::failing_on(keys::ONBOARDING_COMPLETED));
    *store.fail_delete.lock().unwrap() = true;
    let service = service_over(&store);

    match service.generate_onboarding().unwrap_err() {
        CoffreError::StorageIo(msg) => assert!(msg.contains(keys::ONBOARDING_COMPLETED), "{msg}"),
        other => panic!("expected the write failure, got {other:?}"),
    }
}

#[test]
fn failed_restore_leaves_no_key() {
    let origin = RecoveryService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(OsEntropy),
        KeyLineage::Derived,
    );
    let phrase = origin.generate_onboarding().unwrap().phrase.to_string();

    let store = Arc::new(FlakyStore::failing_on(keys::ONBOARDING_COMPLETED));
    let service = service_over(&store);

    assert!(matches!(service.restore(&phrase).unwrap_err(), CoffreError::StorageIo(_)));
    assert!(!service.has_master_key().unwrap());
    assert!(store.inner.is_empty());

    store.heal();
    assert_eq!(service.restore(&phrase).unwrap(), RestoreOutcome::KeyInstalled);
}
