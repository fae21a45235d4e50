//! Plaintext view of a credential record.

use std::fmt;

use zeroize::Zeroizing;

/// Shown in place of a field that failed to decrypt.
pub const UNREADABLE_PLACEHOLDER: &str = "[unable to decrypt]";

/// One decrypted field.  A field that fails to decrypt does not take the
/// rest of the record down with it.
#[derive(Clone, PartialEq, Eq)]
pub enum DecryptedField {
    Value(Zeroizing<String>),
    Unreadable,
}

impl DecryptedField {
    pub fn value(text: impl Into<String>) -> Self {
        Self::Value(Zeroizing::new(text.into()))
    }

    /// The plaintext, if the field decrypted.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(text) => Some(text.as_str()),
            Self::Unreadable => None,
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// The plaintext, or the placeholder for display.
    pub fn display_text(&self) -> &str {
        self.as_str().unwrap_or(UNREADABLE_PLACEHOLDER)
    }
}

impl fmt::Debug for DecryptedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Value(***)"),
            Self::Unreadable => f.write_str("Unreadable"),
        }
    }
}

/// Decrypted credentials for one account.  Absent fields decrypt to "".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedCredential {
    pub username: DecryptedField,
    pub password: DecryptedField,
    pub notes: DecryptedField,
}

impl DecryptedCredential {
    /// Whether every field decrypted.
    pub fn is_complete(&self) -> bool {
        self.username.is_readable() && self.password.is_readable() && self.notes.is_readable()
    }

    /// Number of fields that failed to decrypt.
    pub fn unreadable_count(&self) -> usize {
        [&self.username, &self.password, &self.notes]
            .iter()
            .filter(|f| !f.is_readable())
            .count()
    }
}
