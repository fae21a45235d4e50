//! Integration tests for key custody.

use housevault::crypto::{EncodedKey, SymmetricKey};
use housevault::custody::{FileSessionCache, KeyCustody, MemorySessionCache, SessionCache};
use housevault::errors::VaultError;
use housevault::store::{KeyPersistenceStore, MemoryStore, SqliteStore};
use tempfile::TempDir;

fn encoded(byte: u8) -> EncodedKey {
    SymmetricKey::from_bytes([byte; 32]).export()
}

#[tokio::test]
async fn fetch_of_unknown_user_is_none_and_writes_nothing() {
    let store = MemoryStore::new();
    let custody = KeyCustody::new(store.clone(), MemorySessionCache::new());

    assert!(custody.fetch_persisted_key("nobody").await.unwrap().is_none());
    assert!(custody.fetch_persisted_key("nobody").await.unwrap().is_none());
    assert_eq!(store.key_writes(), 0);
    assert!(store.get_key("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn fetch_is_idempotent() {
    let store = MemoryStore::new();
    let custody = KeyCustody::new(store.clone(), MemorySessionCache::new());
    custody.persist_key("alice", &encoded(1)).await.unwrap();
    let writes = store.key_writes();

    let first = custody.fetch_persisted_key("alice").await.unwrap();
    let second = custody.fetch_persisted_key("alice").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, Some(encoded(1)));
    assert_eq!(store.key_writes(), writes);
}

#[tokio::test]
async fn persist_happens_once_per_user() {
    let store = MemoryStore::new();
    let custody = KeyCustody::new(store.clone(), MemorySessionCache::new());

    custody.persist_key("alice", &encoded(1)).await.unwrap();
    let err = custody.persist_key("alice", &encoded(2)).await.unwrap_err();
    assert!(matches!(err, VaultError::KeyAlreadyPersisted));

    assert_eq!(
        custody.fetch_persisted_key("alice").await.unwrap(),
        Some(encoded(1))
    );
    assert_eq!(store.key_writes(), 1);

    // Other users are unaffected.
    custody.persist_key("bob", &encoded(2)).await.unwrap();
}

#[tokio::test]
async fn fetch_failure_is_store_unavailable() {
    let store = MemoryStore::new();
    let custody = KeyCustody::new(store.clone(), MemorySessionCache::new());
    store.set_offline(true);

    let err = custody.fetch_persisted_key("alice").await.unwrap_err();
    assert!(matches!(err, VaultError::StoreUnavailable(_)));
    assert!(err.is_retryable());

    store.set_offline(false);
    assert_eq!(store.key_writes(), 0);
}

#[tokio::test]
async fn custody_over_sqlite_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.db");

    {
        let custody = KeyCustody::new(SqliteStore::open(&path).unwrap(), MemorySessionCache::new());
        custody.persist_key("alice", &encoded(9)).await.unwrap();
    }

    let custody = KeyCustody::new(SqliteStore::open(&path).unwrap(), MemorySessionCache::new());
    assert_eq!(
        custody.fetch_persisted_key("alice").await.unwrap(),
        Some(encoded(9))
    );
    assert!(matches!(
        custody.persist_key("alice", &encoded(3)).await,
        Err(VaultError::KeyAlreadyPersisted)
    ));
}

#[test]
fn session_cache_is_separate_from_persisted_key() {
    let dir = TempDir::new().unwrap();
    let session = FileSessionCache::new(dir.path(), "alice");
    let custody = KeyCustody::new(MemoryStore::new(), session.clone());

    custody.cache(&encoded(5)).unwrap();
    assert_eq!(custody.cached().unwrap(), Some(encoded(5)));
    assert_eq!(session.load().unwrap(), Some(encoded(5)));

    custody.clear_cache().unwrap();
    assert!(custody.cached().unwrap().is_none());
    assert!(!session.path().exists());
}
