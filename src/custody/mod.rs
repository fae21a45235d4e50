//! Key custody: the single source of truth for the vault key's bytes.
//!
//! `KeyCustody` pairs the remote key persistence store with the session
//! cache.  It never creates a key.  Fetching is read-only, and persisting
//! refuses to overwrite a key that already exists, because replacing the
//! key orphans every record encrypted under the old one.

pub mod session;

use tracing::{debug, warn};

use crate::crypto::EncodedKey;
use crate::errors::{Result, VaultError};
use crate::store::KeyPersistenceStore;

pub use session::{FileSessionCache, MemorySessionCache, SessionCache};

/// Custodian of the persisted key and its session copy.
pub struct KeyCustody<P, C> {
    persisted: P,
    session: C,
}

impl<P: KeyPersistenceStore, C: SessionCache> KeyCustody<P, C> {
    pub fn new(persisted: P, session: C) -> Self {
        Self { persisted, session }
    }

    /// The user's stored key, or `None` if none was ever persisted.
    ///
    /// Idempotent and side-effect free: an empty or failed fetch never
    /// leads to a key being generated here.
    pub async fn fetch_persisted_key(&self, user_id: &str) -> Result<Option<EncodedKey>> {
        let key = self.persisted.get_key(user_id).await.map_err(|e| {
            warn!(user_id, error = %e, "fetching persisted key failed");
            e
        })?;
        debug!(user_id, present = key.is_some(), "fetched persisted key");
        Ok(key)
    }

    /// Persist the user's key.  Allowed exactly once per user.
    ///
    /// Fails with `KeyAlreadyPersisted` if the store already holds a key,
    /// leaving that key untouched.
    pub async fn persist_key(&self, user_id: &str, key: &EncodedKey) -> Result<()> {
        if self.persisted.get_key(user_id).await?.is_some() {
            warn!(user_id, "refusing to overwrite an existing persisted key");
            return Err(VaultError::KeyAlreadyPersisted);
        }
        self.persisted.upsert_key(user_id, key).await?;
        debug!(user_id, "persisted new key");
        Ok(())
    }

    /// Put the key in the session cache.
    pub fn cache(&self, key: &EncodedKey) -> Result<()> {
        self.session.store(key)
    }

    /// The session-cached key, if any.
    pub fn cached(&self) -> Result<Option<EncodedKey>> {
        self.session.load()
    }

    /// Drop the session-cached key.
    pub fn clear_cache(&self) -> Result<()> {
        self.session.clear()
    }
}
