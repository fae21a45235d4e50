//! What an audit entry says happened to a vault.

use std::fmt;
use std::str::FromStr;

use crate::errors::VaultError;

/// A vault operation worth keeping a history of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VaultEvent {
    Setup,
    Unlock,
    Lock,
    CredentialsSaved,
    CredentialsForgotten,
    PasskeyRemoved,
}

impl VaultEvent {
    pub const ALL: [VaultEvent; 6] = [
        Self::Setup,
        Self::Unlock,
        Self::Lock,
        Self::CredentialsSaved,
        Self::CredentialsForgotten,
        Self::PasskeyRemoved,
    ];

    /// Stable token stored in the `event` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Unlock => "unlock",
            Self::Lock => "lock",
            Self::CredentialsSaved => "set",
            Self::CredentialsForgotten => "forget",
            Self::PasskeyRemoved => "passkey-remove",
        }
    }

    /// Whether the event ran a passkey ceremony.
    pub fn is_ceremony(self) -> bool {
        matches!(self, Self::Setup | Self::Unlock)
    }
}

impl fmt::Display for VaultEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VaultEvent {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| VaultError::AuditError(format!("unknown audit event '{s}'")))
    }
}

/// How a recorded operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(FailureKind),
}

impl Outcome {
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "ok",
            Self::Failed(kind) => kind.as_str(),
        }
    }
}

impl FromStr for Outcome {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "ok" {
            return Ok(Self::Succeeded);
        }
        FailureKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .map(Self::Failed)
            .ok_or_else(|| VaultError::AuditError(format!("unknown audit outcome '{s}'")))
    }
}

/// Coarse failure classes, one per vault error family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PlatformUnavailable,
    CeremonyRejected,
    NoPasskey,
    KeyMissing,
    Tampered,
    StoreUnavailable,
    Locked,
    Other,
}

impl FailureKind {
    const ALL: [FailureKind; 8] = [
        Self::PlatformUnavailable,
        Self::CeremonyRejected,
        Self::NoPasskey,
        Self::KeyMissing,
        Self::Tampered,
        Self::StoreUnavailable,
        Self::Locked,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlatformUnavailable => "platform-unavailable",
            Self::CeremonyRejected => "ceremony-rejected",
            Self::NoPasskey => "no-passkey",
            Self::KeyMissing => "key-missing",
            Self::Tampered => "tampered",
            Self::StoreUnavailable => "store-unavailable",
            Self::Locked => "locked",
            Self::Other => "error",
        }
    }
}

impl From<&VaultError> for FailureKind {
    fn from(e: &VaultError) -> Self {
        match e {
            VaultError::PlatformUnavailable => Self::PlatformUnavailable,
            VaultError::RegistrationFailed(_) | VaultError::AuthenticationFailed(_) => {
                Self::CeremonyRejected
            }
            VaultError::NoPasskeyRegistered => Self::NoPasskey,
            VaultError::KeyMissing | VaultError::InvalidKey(_) => Self::KeyMissing,
            VaultError::DecryptionFailed => Self::Tampered,
            VaultError::StoreUnavailable(_) => Self::StoreUnavailable,
            VaultError::VaultLocked | VaultError::NotInitialized => Self::Locked,
            _ => Self::Other,
        }
    }
}

/// One entry to be written: the event, whose vault, and how it ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub event: VaultEvent,
    pub user_id: String,
    pub outcome: Outcome,
    /// Account id or credential id the event touched.
    pub subject: Option<String>,
    pub details: Option<String>,
}

impl AuditRecord {
    pub fn succeeded(event: VaultEvent, user_id: &str) -> Self {
        Self {
            event,
            user_id: user_id.to_string(),
            outcome: Outcome::Succeeded,
            subject: None,
            details: None,
        }
    }

    /// A failed event; the error text becomes the details.
    pub fn failed(event: VaultEvent, user_id: &str, error: &VaultError) -> Self {
        Self {
            outcome: Outcome::Failed(error.into()),
            details: Some(error.to_string()),
            ..Self::succeeded(event, user_id)
        }
    }

    /// Record whatever `result` says happened.
    pub fn from_result<T>(event: VaultEvent, user_id: &str, result: &Result<T, VaultError>) -> Self {
        match result {
            Ok(_) => Self::succeeded(event, user_id),
            Err(e) => Self::failed(event, user_id, e),
        }
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    /// Attach details.  A failure keeps its error text.
    pub fn details(mut self, details: &str) -> Self {
        if !self.outcome.is_failure() {
            self.details = Some(details.to_string());
        }
        self
    }
}
