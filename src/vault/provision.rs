//! The one place a vault key is created.
//!
//! Only `Vault::setup` calls this, and only after the persisted-key fetch
//! came back empty.  A second key would make every record encrypted
//! under the first one unreadable.

use aes_gcm::aead::{KeyInit, OsRng};
use aes_gcm::Aes256Gcm;
use zeroize::Zeroize;

use crate::crypto::{SymmetricKey, KEY_LEN};

/// Generate a fresh random 256-bit key.
pub(super) fn generate_key() -> SymmetricKey {
    let mut generated = Aes256Gcm::generate_key(OsRng);
    let mut bytes = [0u8; KEY_LEN];
    bytes.copy_from_slice(generated.as_slice());
    // GenericArray has no Zeroize impl here; overwrite by hand.
    generated.iter_mut().for_each(|b| *b = 0);
    let key = SymmetricKey::from_bytes(bytes);
    bytes.zeroize();
    key
}
