use std::fmt;

/// Lifecycle of a vault session.
///
/// ```text
/// Uninitialized --init--> NoAuthenticator | Locked | Unlocked
/// NoAuthenticator/Locked --setup--> Unlocked
/// Locked --unlock--> Unlocked
/// Unlocked --lock--> Locked
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// `init` has not run yet.
    Uninitialized,
    /// The user has no registered passkey; only setup is possible.
    NoAuthenticator,
    /// Passkeys exist but no key is held for this session.
    Locked,
    /// The key is cached for this session; records can be read and written.
    Unlocked,
}

impl VaultState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::NoAuthenticator => "no-authenticator",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
        }
    }
}

impl fmt::Display for VaultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the session for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultStatus {
    pub state: VaultState,
    pub has_passkey: bool,
    /// Message from the most recent failed operation, cleared on success.
    pub last_error: Option<String>,
    /// Label for the platform authenticator, for UI copy.
    pub authenticator_name: String,
}

impl VaultStatus {
    pub fn is_unlocked(&self) -> bool {
        self.state == VaultState::Unlocked
    }
}
