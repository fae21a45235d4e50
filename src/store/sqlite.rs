//! SQLite-backed implementation of the server stores.
//!
//! Three tables mirror the server resources:
//! - `user_encryption_keys`: one row per user (primary key `user_id`)
//! - `webauthn_credentials`: credential id is globally unique
//! - `account_credentials`: unique per (user, account), written by upsert
//!
//! The database file is created with owner-only permissions.  Any SQLite
//! failure surfaces as `StoreUnavailable`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::crypto::EncodedKey;
use crate::errors::{Result, VaultError};

use super::{
    require_account_id, AuthenticatorBinding, AuthenticatorBindingStore, CredentialRecordStore,
    EncryptedCredentialData, EncryptedCredentialRecord, KeyPersistenceStore,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS user_encryption_keys (
    user_id        TEXT PRIMARY KEY,
    encryption_key TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS webauthn_credentials (
    credential_id TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL,
    public_key    TEXT NOT NULL,
    counter       INTEGER NOT NULL DEFAULT 0,
    device_type   TEXT NOT NULL DEFAULT 'platform',
    backed_up     INTEGER NOT NULL DEFAULT 0,
    transports    TEXT NOT NULL DEFAULT '[]',
    created_at    TEXT NOT NULL,
    last_used_at  TEXT
);
CREATE INDEX IF NOT EXISTS idx_webauthn_credentials_user
    ON webauthn_credentials (user_id);
CREATE TABLE IF NOT EXISTS account_credentials (
    user_id            TEXT NOT NULL,
    account_id         TEXT NOT NULL,
    username_encrypted TEXT,
    password_encrypted TEXT,
    notes_encrypted    TEXT,
    iv                 TEXT NOT NULL,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    PRIMARY KEY (user_id, account_id)
);
";

/// Shared SQLite store.  Clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the store database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Self::with_connection(conn)
    }

    /// An in-memory database, gone when the last clone is dropped.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| VaultError::StoreUnavailable("connection lock poisoned".into()))
    }
}

/// A `webauthn_credentials` row before its text columns are decoded.
struct BindingRow {
    credential_id: String,
    public_key: String,
    counter: u32,
    device_type: String,
    backed_up: bool,
    transports: String,
    created_at: String,
    last_used_at: Option<String>,
}

impl BindingRow {
    /// A corrupt column fails the read rather than being patched up.
    fn decode(self) -> Result<AuthenticatorBinding> {
        Ok(AuthenticatorBinding {
            transports: parse_transports(&self.transports)?,
            created_at: parse_ts("created_at", &self.created_at)?,
            last_used_at: self
                .last_used_at
                .as_deref()
                .map(|t| parse_ts("last_used_at", t))
                .transpose()?,
            credential_id: self.credential_id,
            public_key: self.public_key,
            counter: self.counter,
            device_type: self.device_type,
            backed_up: self.backed_up,
        })
    }
}

fn parse_ts(column: &str, text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| VaultError::SerializationError(format!("stored {column} '{text}': {e}")))
}

fn parse_transports(text: &str) -> Result<Vec<String>> {
    serde_json::from_str(text)
        .map_err(|e| VaultError::SerializationError(format!("stored transports '{text}': {e}")))
}

impl KeyPersistenceStore for SqliteStore {
    async fn get_key(&self, user_id: &str) -> Result<Option<EncodedKey>> {
        let conn = self.conn()?;
        let key: Option<String> = conn
            .query_row(
                "SELECT encryption_key FROM user_encryption_keys WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(key.filter(|k| !k.is_empty()).map(EncodedKey::new))
    }

    async fn upsert_key(&self, user_id: &str, key: &EncodedKey) -> Result<()> {
        if key.is_empty() {
            return Err(VaultError::InvalidRequest("missing encryption key".into()));
        }
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO user_encryption_keys (user_id, encryption_key, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(user_id) DO UPDATE SET
                encryption_key = excluded.encryption_key,
                updated_at = excluded.updated_at",
            params![user_id, key.as_str(), now],
        )?;
        Ok(())
    }
}

impl AuthenticatorBindingStore for SqliteStore {
    async fn list_bindings(&self, user_id: &str) -> Result<Vec<AuthenticatorBinding>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT credential_id, public_key, counter, device_type, backed_up,
                    transports, created_at, last_used_at
             FROM webauthn_credentials
             WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map(params![user_id], |row| {
            Ok(BindingRow {
                credential_id: row.get(0)?,
                public_key: row.get(1)?,
                counter: row.get(2)?,
                device_type: row.get(3)?,
                backed_up: row.get(4)?,
                transports: row.get(5)?,
                created_at: row.get(6)?,
                last_used_at: row.get(7)?,
            })
        })?;

        let mut bindings = Vec::new();
        for row in rows {
            bindings.push(row?.decode()?);
        }
        Ok(bindings)
    }

    async fn insert_binding(&self, user_id: &str, binding: &AuthenticatorBinding) -> Result<()> {
        binding.validate()?;
        let transports = serde_json::to_string(&binding.transports)
            .map_err(|e| VaultError::SerializationError(e.to_string()))?;

        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM webauthn_credentials WHERE credential_id = ?1",
                params![binding.credential_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(VaultError::Conflict("credential already registered".into()));
        }

        conn.execute(
            "INSERT INTO webauthn_credentials
                (credential_id, user_id, public_key, counter, device_type, backed_up,
                 transports, created_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                binding.credential_id,
                user_id,
                binding.public_key,
                binding.counter,
                binding.device_type,
                binding.backed_up,
                transports,
                binding.created_at.to_rfc3339(),
                binding.last_used_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    async fn delete_binding(&self, user_id: &str, credential_id: &str) -> Result<()> {
        let removed = self.conn()?.execute(
            "DELETE FROM webauthn_credentials WHERE credential_id = ?1 AND user_id = ?2",
            params![credential_id, user_id],
        )?;
        if removed == 0 {
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
        let updated = self.conn()?.execute(
            "UPDATE webauthn_credentials SET counter = ?1, last_used_at = ?2
             WHERE credential_id = ?3 AND user_id = ?4",
            params![counter, at.to_rfc3339(), credential_id, user_id],
        )?;
        if updated == 0 {
            return Err(VaultError::NotFound(format!("passkey '{credential_id}'")));
        }
        Ok(())
    }
}

impl CredentialRecordStore for SqliteStore {
    async fn get_record(
        &self,
        user_id: &str,
        account_id: &str,
    ) -> Result<Option<EncryptedCredentialRecord>> {
        require_account_id(account_id)?;
        let conn = self.conn()?;
        let record = conn
            .query_row(
                "SELECT username_encrypted, password_encrypted, notes_encrypted, iv,
                        created_at, updated_at
                 FROM account_credentials
                 WHERE user_id = ?1 AND account_id = ?2",
                params![user_id, account_id],
                |row| {
                    let data = EncryptedCredentialData {
                        username_encrypted: row.get(0)?,
                        password_encrypted: row.get(1)?,
                        notes_encrypted: row.get(2)?,
                        iv: row.get(3)?,
                    };
                    let created_at: String = row.get(4)?;
                    let updated_at: String = row.get(5)?;
                    Ok((data, created_at, updated_at))
                },
            )
            .optional()?;

        let Some((data, created_at, updated_at)) = record else {
            return Ok(None);
        };
        Ok(Some(EncryptedCredentialRecord {
            account_id: account_id.to_string(),
            data,
            created_at: parse_ts("created_at", &created_at)?,
            updated_at: parse_ts("updated_at", &updated_at)?,
        }))
    }

    async fn upsert_record(
        &self,
        user_id: &str,
        account_id: &str,
        data: &EncryptedCredentialData,
    ) -> Result<EncryptedCredentialRecord> {
        require_account_id(account_id)?;
        data.validate()?;
        let now = Utc::now().to_rfc3339();
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO account_credentials
                    (user_id, account_id, username_encrypted, password_encrypted,
                     notes_encrypted, iv, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT(user_id, account_id) DO UPDATE SET
                    username_encrypted = excluded.username_encrypted,
                    password_encrypted = excluded.password_encrypted,
                    notes_encrypted = excluded.notes_encrypted,
                    iv = excluded.iv,
                    updated_at = excluded.updated_at",
                params![
                    user_id,
                    account_id,
                    data.username_encrypted,
                    data.password_encrypted,
                    data.notes_encrypted,
                    data.iv,
                    now,
                ],
            )?;
        }
        self.get_record(user_id, account_id)
            .await?
            .ok_or_else(|| VaultError::StoreUnavailable("record vanished after upsert".into()))
    }

    async fn delete_record(&self, user_id: &str, account_id: &str) -> Result<()> {
        require_account_id(account_id)?;
        self.conn()?.execute(
            "DELETE FROM account_credentials WHERE user_id = ?1 AND account_id = ?2",
            params![user_id, account_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn binding(id: &str, created_at: DateTime<Utc>) -> AuthenticatorBinding {
        AuthenticatorBinding {
            credential_id: id.to_string(),
            public_key: "pk".to_string(),
            counter: 0,
            device_type: "platform".to_string(),
            backed_up: false,
            transports: vec!["internal".to_string()],
            created_at,
            last_used_at: None,
        }
    }

    #[tokio::test]
    async fn open_creates_database_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.db");
        let _store = SqliteStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn database_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server.db");
        let _store = SqliteStore::open(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn key_upsert_keeps_one_row_per_user() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_key("u1", &EncodedKey::new("first")).await.unwrap();
        store.upsert_key("u1", &EncodedKey::new("second")).await.unwrap();

        let count: i64 = store
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM user_encryption_keys", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            store.get_key("u1").await.unwrap(),
            Some(EncodedKey::new("second"))
        );
    }

    #[tokio::test]
    async fn bindings_listed_newest_first_and_scoped_to_user() {
        let store = SqliteStore::open_in_memory().unwrap();
        let older = Utc::now() - chrono::Duration::hours(1);
        store.insert_binding("u1", &binding("old", older)).await.unwrap();
        store.insert_binding("u1", &binding("new", Utc::now())).await.unwrap();
        store.insert_binding("u2", &binding("other", Utc::now())).await.unwrap();

        let list = store.list_bindings("u1").await.unwrap();
        let ids: Vec<&str> = list.iter().map(|b| b.credential_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(list[0].transports, vec!["internal".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_credential_id_conflicts() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_binding("u1", &binding("dup", Utc::now())).await.unwrap();
        let err = store
            .insert_binding("u2", &binding("dup", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_binding_is_scoped_to_owner() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_binding("u1", &binding("cred", Utc::now())).await.unwrap();

        let err = store.delete_binding("u2", "cred").await.unwrap_err();
        assert!(matches!(err, VaultError::NotFound(_)));
        store.delete_binding("u1", "cred").await.unwrap();
        assert!(store.list_bindings("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn record_use_updates_counter_and_timestamp() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_binding("u1", &binding("cred", Utc::now())).await.unwrap();
        store.record_use("u1", "cred", 7, Utc::now()).await.unwrap();

        let list = store.list_bindings("u1").await.unwrap();
        assert_eq!(list[0].counter, 7);
        assert!(list[0].last_used_at.is_some());
    }

    #[tokio::test]
    async fn record_upsert_preserves_created_at() {
        let store = SqliteStore::open_in_memory().unwrap();
        let data = EncryptedCredentialData {
            username_encrypted: Some("u".into()),
            password_encrypted: Some("p".into()),
            notes_encrypted: None,
            iv: "iv1".into(),
        };
        let first = store.upsert_record("u1", "acct", &data).await.unwrap();

        let updated = EncryptedCredentialData {
            iv: "iv2".into(),
            ..data
        };
        let second = store.upsert_record("u1", "acct", &updated).await.unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.data.iv, "iv2");
        assert!(store.get_record("u2", "acct").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_requires_account_and_iv() {
        let store = SqliteStore::open_in_memory().unwrap();
        let data = EncryptedCredentialData {
            username_encrypted: None,
            password_encrypted: None,
            notes_encrypted: None,
            iv: String::new(),
        };
        assert!(matches!(
            store.upsert_record("u1", "acct", &data).await,
            Err(VaultError::InvalidRequest(_))
        ));
        assert!(matches!(
            store.get_record("u1", " ").await,
            Err(VaultError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_binding_columns_are_reported_not_replaced() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_binding("alice", &binding("c1", Utc::now()))
            .await
            .unwrap();

        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE webauthn_credentials SET transports = 'not json' WHERE credential_id = 'c1'",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.list_bindings("alice").await,
            Err(VaultError::SerializationError(_))
        ));

        store
            .conn()
            .unwrap()
            .execute(
                "UPDATE webauthn_credentials SET transports = '[]', created_at = 'yesterday'
                 WHERE credential_id = 'c1'",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.list_bindings("alice").await,
            Err(VaultError::SerializationError(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_record_timestamp_is_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        let data = EncryptedCredentialData {
            username_encrypted: Some("u".into()),
            password_encrypted: None,
            notes_encrypted: None,
            iv: "iv".into(),
        };
        store.upsert_record("alice", "bank", &data).await.unwrap();

        store
            .conn()
            .unwrap()
            .execute("UPDATE account_credentials SET updated_at = ''", [])
            .unwrap();
        assert!(matches!(
            store.get_record("alice", "bank").await,
            Err(VaultError::SerializationError(_))
        ));
    }
}
