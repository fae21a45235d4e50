//! Authenticator data: the fixed-layout prefix every ceremony returns.
//!
//! ```text
//! [ rpIdHash (32) | flags (1) | signCount (4, big-endian) | ... ]
//! ```
//!
//! Attested credential data and extensions may follow; the vault only
//! needs the fixed prefix, so anything after byte 37 is ignored.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::{Result, VaultError};

/// Length of the SHA-256 relying-party id hash.
pub const RP_ID_HASH_LEN: usize = 32;

/// Byte offset of the big-endian signature counter.
pub const SIGN_COUNT_OFFSET: usize = 33;

/// Minimum valid length: hash + flags + counter.
pub const MIN_LEN: usize = SIGN_COUNT_OFFSET + 4;

/// User present.
pub const FLAG_UP: u8 = 0x01;
/// User verified.
pub const FLAG_UV: u8 = 0x04;
/// Backup eligible.
pub const FLAG_BE: u8 = 0x08;
/// Backed up.
pub const FLAG_BS: u8 = 0x10;

/// Parsed fixed prefix of authenticator data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; RP_ID_HASH_LEN],
    pub flags: u8,
    pub sign_count: u32,
}

impl AuthenticatorData {
    /// Parse the prefix of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_LEN {
            return Err(VaultError::InvalidEncoding(format!(
                "authenticator data must be at least {MIN_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let mut rp_id_hash = [0u8; RP_ID_HASH_LEN];
        rp_id_hash.copy_from_slice(&bytes[..RP_ID_HASH_LEN]);

        let mut counter = [0u8; 4];
        counter.copy_from_slice(&bytes[SIGN_COUNT_OFFSET..MIN_LEN]);

        Ok(Self {
            rp_id_hash,
            flags: bytes[RP_ID_HASH_LEN],
            sign_count: u32::from_be_bytes(counter),
        })
    }

    /// Serialize the fixed prefix.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(MIN_LEN);
        data.extend_from_slice(&self.rp_id_hash);
        data.push(self.flags);
        data.extend_from_slice(&self.sign_count.to_be_bytes());
        data
    }

    pub fn user_present(&self) -> bool {
        self.flags & FLAG_UP != 0
    }

    pub fn user_verified(&self) -> bool {
        self.flags & FLAG_UV != 0
    }

    pub fn backup_eligible(&self) -> bool {
        self.flags & FLAG_BE != 0
    }

    pub fn backed_up(&self) -> bool {
        self.flags & FLAG_BS != 0
    }

    /// Whether this data was produced for `rp_id`.
    pub fn matches_rp(&self, rp_id: &str) -> bool {
        self.rp_id_hash.ct_eq(&rp_id_hash(rp_id)).into()
    }
}

/// SHA-256 of the relying-party id.
pub fn rp_id_hash(rp_id: &str) -> [u8; RP_ID_HASH_LEN] {
    Sha256::digest(rp_id.as_bytes()).into()
}
