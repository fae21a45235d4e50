use thiserror::Error;

/// All errors that can occur in HouseVault.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Authenticator errors ---
    #[error("Biometric authentication is not available on this device")]
    PlatformUnavailable,

    #[error("Passkey registration failed: {0}")]
    RegistrationFailed(String),

    #[error("Biometric authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("No passkey registered; run setup first")]
    NoPasskeyRegistered,

    // --- Key custody errors ---
    #[error("Encryption key not found for this account; it was never set up or has been removed")]
    KeyMissing,

    #[error("An encryption key is already stored for this user and cannot be replaced")]
    KeyAlreadyPersisted,

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    // --- Crypto errors ---
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: authentication tag mismatch (wrong key, IV, or corrupted data)")]
    DecryptionFailed,

    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    // --- State errors ---
    #[error("Vault is locked")]
    VaultLocked,

    #[error("Vault has not been initialized")]
    NotInitialized,

    // --- Store errors ---
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- Audit errors ---
    #[error("Audit error: {0}")]
    AuditError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Serialization errors ---
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,
}

impl VaultError {
    /// Whether re-invoking the same operation may succeed without the user
    /// changing anything about their setup.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RegistrationFailed(_) | Self::AuthenticationFailed(_) | Self::StoreUnavailable(_)
        )
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

/// Convenience type alias for HouseVault results.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceremony_and_network_failures_are_retryable() {
        assert!(VaultError::RegistrationFailed("cancelled".into()).is_retryable());
        assert!(VaultError::AuthenticationFailed("cancelled".into()).is_retryable());
        assert!(VaultError::StoreUnavailable("offline".into()).is_retryable());
    }

    #[test]
    fn setup_problems_are_not_retryable() {
        assert!(!VaultError::PlatformUnavailable.is_retryable());
        assert!(!VaultError::NoPasskeyRegistered.is_retryable());
        assert!(!VaultError::KeyMissing.is_retryable());
        assert!(!VaultError::DecryptionFailed.is_retryable());
    }
}
