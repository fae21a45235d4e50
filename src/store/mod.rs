//! Server-side stores the vault talks to.
//!
//! The vault never sees a database directly.  It goes through three
//! boundary traits, one per server resource:
//! - `KeyPersistenceStore`: the one exported key per user
//! - `AuthenticatorBindingStore`: registered passkeys per user
//! - `CredentialRecordStore`: encrypted credentials per (user, account)
//!
//! Every call is keyed by the authenticated user id; the store is
//! responsible for scoping rows to that user.  Request and response
//! shapes are the fixed serde structs below, with camelCase JSON names.
//!
//! Implementations: `MemoryStore` (in-process, `memory`) and `SqliteStore`
//! (`sqlite`).

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::EncodedKey;
use crate::errors::{Result, VaultError};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A registered platform authenticator (passkey) for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorBinding {
    /// Credential id, base64url.
    pub credential_id: String,

    /// Public key bytes, base64url.
    pub public_key: String,

    /// Last signature counter seen for this credential.
    #[serde(default)]
    pub counter: u32,

    /// Authenticator attachment, e.g. "platform".
    #[serde(default = "default_device_type")]
    pub device_type: String,

    /// Whether the credential is eligible for backup/sync by the platform.
    #[serde(default)]
    pub backed_up: bool,

    /// Transports reported by the authenticator, e.g. ["internal"].
    #[serde(default)]
    pub transports: Vec<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

fn default_device_type() -> String {
    "platform".to_string()
}

impl AuthenticatorBinding {
    /// Reject bindings that are missing their identifying fields.
    pub fn validate(&self) -> Result<()> {
        if self.credential_id.is_empty() || self.public_key.is_empty() {
            return Err(VaultError::InvalidRequest(
                "binding requires credentialId and publicKey".into(),
            ));
        }
        Ok(())
    }
}

/// The encrypted fields of one account's credentials.
///
/// All present ciphertexts were produced under the same key with the one
/// shared `iv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedCredentialData {
    pub username_encrypted: Option<String>,
    pub password_encrypted: Option<String>,
    pub notes_encrypted: Option<String>,
    pub iv: String,
}

impl EncryptedCredentialData {
    pub fn validate(&self) -> Result<()> {
        if self.iv.is_empty() {
            return Err(VaultError::InvalidRequest("record requires an iv".into()));
        }
        Ok(())
    }
}

/// A stored credential record for one (user, account) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedCredentialRecord {
    pub account_id: String,
    #[serde(flatten)]
    pub data: EncryptedCredentialData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence for the user's single exported key.
#[allow(async_fn_in_trait)]
pub trait KeyPersistenceStore {
    /// The stored key, or `None` if the user never set one.  Never writes.
    async fn get_key(&self, user_id: &str) -> Result<Option<EncodedKey>>;

    /// Insert or replace the user's key (one row per user).
    async fn upsert_key(&self, user_id: &str, key: &EncodedKey) -> Result<()>;
}

/// Persistence for a user's registered authenticators.
#[allow(async_fn_in_trait)]
pub trait AuthenticatorBindingStore {
    /// All bindings for the user, newest first.
    async fn list_bindings(&self, user_id: &str) -> Result<Vec<AuthenticatorBinding>>;

    /// Store a new binding.  Fails with `Conflict` if the credential id is
    /// already registered.
    async fn insert_binding(&self, user_id: &str, binding: &AuthenticatorBinding) -> Result<()>;

    /// Remove a binding.  Fails with `NotFound` if the user has no such
    /// credential.
    async fn delete_binding(&self, user_id: &str, credential_id: &str) -> Result<()>;

    /// Record a successful assertion: new counter and last-used time.
    async fn record_use(
        &self,
        user_id: &str,
        credential_id: &str,
        counter: u32,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Persistence for per-account encrypted credentials.
#[allow(async_fn_in_trait)]
pub trait CredentialRecordStore {
    async fn get_record(
        &self,
        user_id: &str,
        account_id: &str,
    ) -> Result<Option<EncryptedCredentialRecord>>;

    /// Update the record if one exists for (user, account), else insert it.
    async fn upsert_record(
        &self,
        user_id: &str,
        account_id: &str,
        data: &EncryptedCredentialData,
    ) -> Result<EncryptedCredentialRecord>;

    async fn delete_record(&self, user_id: &str, account_id: &str) -> Result<()>;
}

/// Everything the vault needs from the server, in one cloneable handle.
///
/// Clones must share the same underlying data.
pub trait RemoteStore:
    KeyPersistenceStore + AuthenticatorBindingStore + CredentialRecordStore + Clone
{
}

impl<T> RemoteStore for T where
    T: KeyPersistenceStore + AuthenticatorBindingStore + CredentialRecordStore + Clone
{
}

/// Shared argument check for account ids.
pub(crate) fn require_account_id(account_id: &str) -> Result<()> {
    if account_id.trim().is_empty() {
        return Err(VaultError::InvalidRequest("missing account id".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_json_uses_camel_case_and_defaults() {
        let json = r#"{
            "credentialId": "abc",
            "publicKey": "def",
            "createdAt": "2026-01-01T00:00:00Z"
        }"#;
        let binding: AuthenticatorBinding = serde_json::from_str(json).unwrap();
        assert_eq!(binding.credential_id, "abc");
        assert_eq!(binding.device_type, "platform");
        assert!(!binding.backed_up);
        assert!(binding.transports.is_empty());
        assert_eq!(binding.counter, 0);
        assert!(binding.last_used_at.is_none());
    }

    #[test]
    fn binding_without_public_key_is_invalid() {
        let binding = AuthenticatorBinding {
            credential_id: "abc".into(),
            public_key: String::new(),
            counter: 0,
            device_type: default_device_type(),
            backed_up: false,
            transports: vec![],
            created_at: Utc::now(),
            last_used_at: None,
        };
        assert!(matches!(
            binding.validate(),
            Err(VaultError::InvalidRequest(_))
        ));
    }

    #[test]
    fn record_flattens_encrypted_fields() {
        let record = EncryptedCredentialRecord {
            account_id: "acct-1".into(),
            data: EncryptedCredentialData {
                username_encrypted: Some("u".into()),
                password_encrypted: None,
                notes_encrypted: None,
                iv: "iv".into(),
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["accountId"], "acct-1");
        assert_eq!(value["usernameEncrypted"], "u");
        assert!(value["passwordEncrypted"].is_null());
        assert_eq!(value["iv"], "iv");
    }

    #[test]
    fn record_data_requires_iv() {
        let data = EncryptedCredentialData {
            username_encrypted: None,
            password_encrypted: None,
            notes_encrypted: None,
            iv: String::new(),
        };
        assert!(data.validate().is_err());
    }
}
