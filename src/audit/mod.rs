//! Audit trail of vault events.
//!
//! Every setup, unlock, lock, record write and passkey removal is kept in
//! `<data_dir>/audit.db` together with how it ended, so `housevault audit`
//! can show failed ceremonies and `status` can warn about a run of failed
//! unlocks.  Entries never contain key material or plaintext.
//!
//! Writing is best effort: a vault operation never fails because its audit
//! entry could not be stored.

pub mod event;

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::{debug, warn};

use crate::errors::{Result, VaultError};

pub use event::{AuditRecord, FailureKind, Outcome, VaultEvent};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vault_events (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    at       TEXT NOT NULL,
    event    TEXT NOT NULL,
    outcome  TEXT NOT NULL,
    user_id  TEXT NOT NULL,
    subject  TEXT,
    details  TEXT
);
CREATE INDEX IF NOT EXISTS idx_vault_events_user ON vault_events (user_id, id);
";

/// A stored audit entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub at: DateTime<Utc>,
    pub record: AuditRecord,
}

/// Which entries `AuditLog::query` returns, newest first.
#[derive(Debug, Clone)]
pub struct AuditFilter {
    pub limit: usize,
    pub since: Option<DateTime<Utc>>,
    /// `None` returns every user's entries.
    pub user_id: Option<String>,
    pub failures_only: bool,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            limit: 50,
            since: None,
            user_id: None,
            failures_only: false,
        }
    }
}

/// The SQLite-backed audit trail.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) `<data_dir>/audit.db` with owner-only permissions.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = Self::db_path(data_dir);
        let conn = Connection::open(&path)
            .map_err(|e| VaultError::AuditError(format!("open {}: {e}", path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        conn.execute_batch(SCHEMA)
            .map_err(|e| VaultError::AuditError(format!("schema: {e}")))?;
        Ok(Self { conn })
    }

    pub fn db_path(data_dir: &Path) -> PathBuf {
        data_dir.join("audit.db")
    }

    pub fn append(&self, record: &AuditRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO vault_events (at, event, outcome, user_id, subject, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    timestamp(Utc::now()),
                    record.event.as_str(),
                    record.outcome.as_str(),
                    record.user_id,
                    record.subject,
                    record.details,
                ],
            )
            .map_err(|e| VaultError::AuditError(format!("append: {e}")))?;
        Ok(())
    }

    pub fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let mut conditions = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(since) = filter.since {
            values.push(Value::Text(timestamp(since)));
            conditions.push(format!("at >= ?{}", values.len()));
        }
        if let Some(user_id) = &filter.user_id {
            values.push(Value::Text(user_id.clone()));
            conditions.push(format!("user_id = ?{}", values.len()));
        }
        if filter.failures_only {
            conditions.push("outcome != 'ok'".to_string());
        }
        values.push(Value::Integer(i64::try_from(filter.limit).unwrap_or(i64::MAX)));

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT id, at, event, outcome, user_id, subject, details
             FROM vault_events {where_clause}
             ORDER BY id DESC
             LIMIT ?{}",
            values.len()
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| VaultError::AuditError(format!("query: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(values), RawEntry::from_row)
            .map_err(|e| VaultError::AuditError(format!("query: {e}")))?;

        let mut entries = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| VaultError::AuditError(format!("row: {e}")))?;
            entries.push(raw.decode()?);
        }
        Ok(entries)
    }

    /// Failed unlocks for `user_id` since its last successful setup or unlock.
    pub fn failed_unlocks_since_success(&self, user_id: &str) -> Result<u64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM vault_events
                 WHERE user_id = ?1 AND event = 'unlock' AND outcome != 'ok'
                   AND id > COALESCE(
                       (SELECT MAX(id) FROM vault_events
                        WHERE user_id = ?1 AND event IN ('setup', 'unlock') AND outcome = 'ok'),
                       0)",
                params![user_id],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| u64::try_from(n).unwrap_or(0))
            .map_err(|e| VaultError::AuditError(format!("count: {e}")))
    }
}

/// Fixed-width UTC text so `at` compares correctly as a string.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

struct RawEntry {
    id: i64,
    at: String,
    event: String,
    outcome: String,
    user_id: String,
    subject: Option<String>,
    details: Option<String>,
}

impl RawEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            at: row.get(1)?,
            event: row.get(2)?,
            outcome: row.get(3)?,
            user_id: row.get(4)?,
            subject: row.get(5)?,
            details: row.get(6)?,
        })
    }

    fn decode(self) -> Result<AuditEntry> {
        let at = DateTime::parse_from_rfc3339(&self.at)
            .map_err(|e| VaultError::AuditError(format!("entry {} timestamp: {e}", self.id)))?
            .with_timezone(&Utc);
        Ok(AuditEntry {
            id: self.id,
            at,
            record: AuditRecord {
                event: self.event.parse()?,
                outcome: self.outcome.parse()?,
                user_id: self.user_id,
                subject: self.subject,
                details: self.details,
            },
        })
    }
}

/// Append `record` to the trail in `data_dir`, logging instead of failing.
pub fn record(data_dir: &Path, record: &AuditRecord) {
    let written = AuditLog::open(data_dir).and_then(|log| log.append(record));
    match written {
        Ok(()) => debug!(event = %record.event, outcome = record.outcome.as_str(), "audit entry written"),
        Err(e) => warn!(event = %record.event, error = %e, "audit entry dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn log() -> (TempDir, AuditLog) {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::open(dir.path()).unwrap();
        (dir, log)
    }

    #[test]
    fn entries_come_back_typed_and_newest_first() {
        let (_dir, log) = log();
        log.append(&AuditRecord::succeeded(VaultEvent::Setup, "alice").details("first passkey"))
            .unwrap();
        log.append(&AuditRecord::succeeded(VaultEvent::CredentialsSaved, "alice").subject("netflix"))
            .unwrap();

        let entries = log.query(&AuditFilter::default()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].record.event, VaultEvent::CredentialsSaved);
        assert_eq!(entries[0].record.subject.as_deref(), Some("netflix"));
        assert_eq!(entries[1].record.event, VaultEvent::Setup);
        assert_eq!(entries[1].record.outcome, Outcome::Succeeded);
    }

    #[test]
    fn filter_by_user_failures_and_time() {
        let (_dir, log) = log();
        log.append(&AuditRecord::succeeded(VaultEvent::Unlock, "alice")).unwrap();
        log.append(&AuditRecord::failed(VaultEvent::Unlock, "alice", &VaultError::KeyMissing))
            .unwrap();
        log.append(&AuditRecord::succeeded(VaultEvent::Lock, "bob")).unwrap();

        let alice = AuditFilter {
            user_id: Some("alice".into()),
            ..AuditFilter::default()
        };
        assert_eq!(log.query(&alice).unwrap().len(), 2);

        let failures = AuditFilter {
            failures_only: true,
            ..AuditFilter::default()
        };
        let failed = log.query(&failures).unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(
            failed[0].record.outcome,
            Outcome::Failed(FailureKind::KeyMissing)
        );

        let future = AuditFilter {
            since: Some(Utc::now() + chrono::Duration::hours(1)),
            ..AuditFilter::default()
        };
        assert!(log.query(&future).unwrap().is_empty());

        let limited = AuditFilter {
            limit: 1,
            ..AuditFilter::default()
        };
        assert_eq!(log.query(&limited).unwrap()[0].record.user_id, "bob");
    }

    #[test]
    fn failed_unlock_streak_resets_on_success() {
        let (_dir, log) = log();
        let denied = VaultError::AuthenticationFailed("denied".into());

        log.append(&AuditRecord::succeeded(VaultEvent::Setup, "alice")).unwrap();
        log.append(&AuditRecord::failed(VaultEvent::Unlock, "alice", &denied)).unwrap();
        log.append(&AuditRecord::failed(VaultEvent::Unlock, "alice", &denied)).unwrap();
        log.append(&AuditRecord::failed(VaultEvent::Unlock, "bob", &denied)).unwrap();
        assert_eq!(log.failed_unlocks_since_success("alice").unwrap(), 2);

        log.append(&AuditRecord::succeeded(VaultEvent::Unlock, "alice")).unwrap();
        assert_eq!(log.failed_unlocks_since_success("alice").unwrap(), 0);
        assert_eq!(log.failed_unlocks_since_success("bob").unwrap(), 1);
    }

    #[test]
    fn corrupt_entry_is_an_error() {
        let (_dir, log) = log();
        log.append(&AuditRecord::succeeded(VaultEvent::Lock, "alice")).unwrap();
        log.conn
            .execute("UPDATE vault_events SET event = 'rotate'", [])
            .unwrap();
        assert!(matches!(
            log.query(&AuditFilter::default()),
            Err(VaultError::AuditError(_))
        ));
    }

    #[test]
    fn record_helper_never_fails() {
        let dir = TempDir::new().unwrap();
        record(dir.path(), &AuditRecord::succeeded(VaultEvent::Lock, "alice"));
        assert_eq!(
            AuditLog::open(dir.path())
                .unwrap()
                .query(&AuditFilter::default())
                .unwrap()
                .len(),
            1
        );

        record(
            Path::new("/nonexistent/housevault"),
            &AuditRecord::succeeded(VaultEvent::Lock, "alice"),
        );
    }

    #[cfg(unix)]
    #[test]
    fn audit_db_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (dir, _log) = log();
        let mode = std::fs::metadata(AuditLog::db_path(dir.path()))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
