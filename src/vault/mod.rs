//! Vault module: the session state machine over the lower layers.
//!
//! This module provides:
//! - `VaultState` and `VaultStatus` (`state`)
//! - Decrypted record types with per-field failure (`records`)
//! - The `Vault` itself: init, setup, unlock, lock, record encryption (`machine`)
//!
//! Key generation lives in the private `provision` module so that
//! `Vault::setup` is the only caller that can create a key.

pub mod machine;
mod provision;
pub mod records;
pub mod state;

pub use machine::{Vault, PLATFORM_UNAVAILABLE_MESSAGE};
pub use records::{DecryptedCredential, DecryptedField, UNREADABLE_PLACEHOLDER};
pub use state::{VaultState, VaultStatus};
