use lessonsync_crypto::{
    generate_nonce, CryptoError, KeySpec, KeyStore, MemoryKeyStore, NONCE_SIZE, TAG_SIZE,
};
use proptest::prelude::*;

const KEY: &str = "LessonSyncCredentials";

fn store_with_key() -> MemoryKeyStore {
    let store = MemoryKeyStore::new();
    store.generate_key(KEY, &KeySpec::aead_256()).unwrap();
    store
}

// ── Lifecycle ──

#[test]
fn new_store_has_no_keys() {
    let store = MemoryKeyStore::new();
    assert!(!store.has_key(KEY).unwrap());
}

#[test]
fn generate_then_has_key() {
    let store = store_with_key();
    assert!(store.has_key(KEY).unwrap());
}

#[test]
fn generate_is_idempotent() {
    let store = store_with_key();
    let nonce = generate_nonce();
    let sealed = store.get_key(KEY).unwrap().encrypt(&nonce, b"doc").unwrap();

    // A second generate must not replace the existing key.
    store.generate_key(KEY, &KeySpec::aead_256()).unwrap();
    let opened = store.get_key(KEY).unwrap().decrypt(&nonce, &sealed).unwrap();
    assert_eq!(opened, b"doc");
}

#[test]
fn get_missing_key_fails() {
    let store = MemoryKeyStore::new();
    assert!(matches!(store.get_key(KEY), Err(CryptoError::KeyNotFound(_))));
}

#[test]
fn delete_missing_key_is_ok() {
    let store = MemoryKeyStore::new();
    store.delete_key(KEY).unwrap();
}

#[test]
fn delete_removes_key() {
    let store = store_with_key();
    store.delete_key(KEY).unwrap();
    assert!(!store.has_key(KEY).unwrap());
}

#[test]
fn handle_reports_name() {
    let store = store_with_key();
    assert_eq!(store.get_key(KEY).unwrap().name(), KEY);
}

#[test]
fn unavailable_store_fails_every_call() {
    let store = MemoryKeyStore::unavailable();
    assert!(matches!(store.has_key(KEY), Err(CryptoError::KeyUnavailable(_))));
    assert!(matches!(
        store.generate_key(KEY, &KeySpec::aead_256()),
        Err(CryptoError::KeyUnavailable(_))
    ));
    assert!(matches!(store.get_key(KEY), Err(CryptoError::KeyUnavailable(_))));
}

#[test]
fn exportable_spec_rejected() {
    let store = MemoryKeyStore::new();
    let spec = KeySpec {
        exportable: true,
        ..KeySpec::aead_256()
    };
    assert!(matches!(
        store.generate_key(KEY, &spec),
        Err(CryptoError::UnsupportedSpec(_))
    ));
    assert!(!store.has_key(KEY).unwrap());
}

// ── AEAD through handles ──

#[test]
fn ciphertext_carries_tag() {
    let store = store_with_key();
    let sealed = store
        .get_key(KEY)
        .unwrap()
        .encrypt(&[0u8; NONCE_SIZE], b"twelve bytes")
        .unwrap();
    assert_eq!(sealed.len(), 12 + TAG_SIZE);
}

#[test]
fn keys_are_distinct_per_name() {
    let store = store_with_key();
    store.generate_key("other", &KeySpec::aead_256()).unwrap();

    let nonce = generate_nonce();
    let sealed = store.get_key(KEY).unwrap().encrypt(&nonce, b"doc").unwrap();
    let result = store.get_key("other").unwrap().decrypt(&nonce, &sealed);
    assert!(matches!(result, Err(CryptoError::Decryption(_))));
}

#[test]
fn regenerated_key_cannot_open_old_ciphertext() {
    let store = store_with_key();
    let nonce = generate_nonce();
    let sealed = store.get_key(KEY).unwrap().encrypt(&nonce, b"doc").unwrap();

    store.delete_key(KEY).unwrap();
    store.generate_key(KEY, &KeySpec::aead_256()).unwrap();

    assert!(store.get_key(KEY).unwrap().decrypt(&nonce, &sealed).is_err());
}

proptest! {
    #[test]
    fn any_bit_flip_is_detected(
        plaintext in proptest::collection::vec(any::<u8>(), 0..256),
        flip in any::<usize>(),
        bit in 0u8..8,
    ) {
        let store = store_with_key();
        let key = store.get_key(KEY).unwrap();
        let nonce = generate_nonce();
        let mut sealed = key.encrypt(&nonce, &plaintext).unwrap();

        let idx = flip % sealed.len();
        sealed[idx] ^= 1 << bit;

        prop_assert!(key.decrypt(&nonce, &sealed).is_err());
    }
}
