//! In-process implementation of the server stores.
//!
//! Clones share state, so a caller can hand one clone to a `Vault` and
//! keep another to inspect what was written.  The store also counts key
//! writes and can be switched offline to exercise `StoreUnavailable`
//! paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::crypto::EncodedKey;
use crate::errors::{Result, VaultError};

use super::{
    require_account_id, AuthenticatorBinding, AuthenticatorBindingStore, CredentialRecordStore,
    EncryptedCredentialData, EncryptedCredentialRecord, KeyPersistenceStore,
};

#[derive(Default)]
struct Inner {
    keys: HashMap<String, EncodedKey>,
    /// (user id, binding) in insertion order.
    bindings: Vec<(String, AuthenticatorBinding)>,
    records: HashMap<(String, String), EncryptedCredentialRecord>,
    key_reads: usize,
    key_writes: usize,
    offline: bool,
}

/// Shared in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `get_key` calls served so far.
    pub fn key_reads(&self) -> usize {
        self.lock_unchecked().key_reads
    }

    /// Number of `upsert_key` calls that wrote so far.
    pub fn key_writes(&self) -> usize {
        self.lock_unchecked().key_writes
    }

    /// Simulate the server being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.lock_unchecked().offline = offline;
    }

    /// Lock ignoring the offline flag (for inspection helpers).
    fn lock_unchecked(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Lock for a store call, failing if the store is offline.
    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        let guard = self.lock_unchecked();
        if guard.offline {
            return Err(VaultError::StoreUnavailable("server unreachable".into()));
        }
        Ok(guard)
    }
}

impl KeyPersistenceStore for MemoryStore {
    async fn get_key(&self, user_id: &str) -> Result<Option<EncodedKey>> {
        let mut inner = self.lock()?;
        inner.key_reads += 1;
        Ok(inner.keys.get(user_id).cloned())
    }

    async fn upsert_key(&self, user_id: &str, key: &EncodedKey) -> Result<()> {
        if key.is_empty() {
            return Err(VaultError::InvalidRequest("missing encryption key".into()));
        }
        let mut inner = self.lock()?;
        inner.keys.insert(user_id.to_string(), key.clone());
        inner.key_writes += 1;
        Ok(())
    }
}

impl AuthenticatorBindingStore for MemoryStore {
    async fn list_bindings(&self, user_id: &str) -> Result<Vec<AuthenticatorBinding>> {
        let inner = self.lock()?;
        let mut list: Vec<AuthenticatorBinding> = inner
            .bindings
            .iter()
            .filter(|(owner, _)| owner == user_id)
            .map(|(_, b)| b.clone())
            .collect();
        // Newest first; the stable sort keeps later inserts ahead on ties.
        list.reverse();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn insert_binding(&self, user_id: &str, binding: &AuthenticatorBinding) -> Result<()> {
        binding.validate()?;
        let mut inner = self.lock()?;
        if inner
            .bindings
            .iter()
            .any(|(_, b)| b.credential_id == binding.credential_id)
        {
            return Err(VaultError::Conflict("credential already registered".into()));
        }
        inner.bindings.push((user_id.to_string(), binding.clone()));
        Ok(())
    }

    async fn delete_binding(&self, user_id: &str, credential_id: &str) -> Result<()> {
        let mut inner = self.lock()?;
        let before = inner.bindings.len();
        inner
            .bindings
            .retain(|(owner, b)| !(owner == user_id && b.credential_id == credential_id));
        if inner.bindings.len() == before {
            return Err(VaultError::NotFound(format!("passkey '{credential_id}'")));
        }
        Ok(())
    }

    async fn record_use(
        &self,
        user_id: &str,
        credential_id: &str,
        counter: u32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let binding = inner
            .bindings
            .iter_mut()
            .find(|(owner, b)| owner == user_id && b.credential_id == credential_id)
            .map(|(_, b)| b)
            .ok_or_else(|| VaultError::NotFound(format!("passkey '{credential_id}'")))?;
        binding.counter = counter;
        binding.last_used_at = Some(at);
        Ok(())
    }
}

impl CredentialRecordStore for MemoryStore {
    async fn get_record(
        &self,
        user_id: &str,
        account_id: &str,
    ) -> Result<Option<EncryptedCredentialRecord>> {
        require_account_id(account_id)?;
        let inner = self.lock()?;
        Ok(inner
            .records
            .get(&(user_id.to_string(), account_id.to_string()))
            .cloned())
    }

    async fn upsert_record(
        &self,
        user_id: &str,
        account_id: &str,
        data: &EncryptedCredentialData,
    ) -> Result<EncryptedCredentialRecord> {
        require_account_id(account_id)?;
        data.validate()?;
        let mut inner = self.lock()?;
        let now = Utc::now();
        let slot = (user_id.to_string(), account_id.to_string());
        let created_at = inner.records.get(&slot).map_or(now, |r| r.created_at);
        let record = EncryptedCredentialRecord {
            account_id: account_id.to_string(),
            data: data.clone(),
            created_at,
            updated_at: now,
        };
        inner.records.insert(slot, record.clone());
        Ok(record)
    }

    async fn delete_record(&self, user_id: &str, account_id: &str) -> Result<()> {
        require_account_id(account_id)?;
        let mut inner = self.lock()?;
        inner
            .records
            .remove(&(user_id.to_string(), account_id.to_string()));
        Ok(())
    }
}
