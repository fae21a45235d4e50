//! Cryptographic primitives for HouseVault.
//!
//! This module provides:
//! - base64 / base64url helpers for values carried over JSON (`encoding`)
//! - the zeroizing AES-256 key and its storable form (`keys`)
//! - AES-256-GCM field envelopes (`envelope`)

pub mod encoding;
pub mod envelope;
pub mod keys;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{encrypt, decrypt, SymmetricKey, ...};
pub use encoding::{from_base64, from_base64url, to_base64, to_base64url};
pub use envelope::{decrypt, encrypt, encrypt_with_iv, generate_iv, Envelope, IV_LEN};
pub use keys::{EncodedKey, SymmetricKey, KEY_LEN};
