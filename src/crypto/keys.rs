//! The vault's long-lived symmetric key.
//!
//! A `SymmetricKey` is the in-memory handle used for AES-256-GCM.  An
//! `EncodedKey` is its storable text form (standard base64 of the 32 raw
//! bytes), which is what the key persistence store and the session cache
//! hold.  Both wipe their contents on drop.
//!
//! This module can import and export keys but deliberately has no
//! generator: fresh keys are only minted by the vault's setup path.

use std::fmt;

use aes_gcm::{Aes256Gcm, Key, KeyInit};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::errors::{Result, VaultError};

use super::encoding::{from_base64, to_base64};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// A 256-bit AES-GCM key, zeroed when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_LEN],
}

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Wrap a key given as a slice, rejecting anything that is not 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            VaultError::InvalidKey(format!(
                "expected {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Import a key from its stored text form.
    pub fn import(encoded: &EncodedKey) -> Result<Self> {
        let raw = Zeroizing::new(
            from_base64(encoded.as_str()).map_err(|e| VaultError::InvalidKey(e.to_string()))?,
        );
        Self::from_slice(&raw)
    }

    /// Export the key to its stored text form.
    pub fn export(&self) -> EncodedKey {
        EncodedKey::new(to_base64(&self.bytes))
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Build the AES-256-GCM cipher for this key.
    pub(crate) fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.bytes))
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Base64 text form of a `SymmetricKey`, as persisted and session-cached.
#[derive(Clone)]
pub struct EncodedKey(Zeroizing<String>);

impl EncodedKey {
    pub fn new(text: impl Into<String>) -> Self {
        Self(Zeroizing::new(text.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for EncodedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl Eq for EncodedKey {}

impl fmt::Debug for EncodedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncodedKey(<redacted>)")
    }
}
