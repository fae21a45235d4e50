//! AES-256-GCM envelopes for short text fields.
//!
//! An envelope is the `(ciphertext, iv)` pair produced by one encryption,
//! both as standard base64 text.  The 16-byte authentication tag is
//! appended to the ciphertext by the cipher and travels with it.
//!
//! `encrypt` draws a fresh 12-byte IV on every call.  `encrypt_with_iv`
//! takes the IV from the caller and exists only so the fields of one
//! credential record can share a single IV; never pass it an IV that was
//! used for a different record under the same key.

use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use zeroize::Zeroize;

use crate::errors::{Result, VaultError};

use super::encoding::{from_base64, to_base64};
use super::keys::SymmetricKey;

/// Size of the AES-256-GCM IV (nonce) in bytes.
pub const IV_LEN: usize = 12;

/// Ciphertext and IV from one encryption, both base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub ciphertext: String,
    pub iv: String,
}

/// Generate a fresh random IV, base64-encoded.
pub fn generate_iv() -> String {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    to_base64(&nonce)
}

/// Encrypt `plaintext` under `key` with a freshly generated IV.
pub fn encrypt(plaintext: &str, key: &SymmetricKey) -> Result<Envelope> {
    let iv = generate_iv();
    let ciphertext = encrypt_with_iv(plaintext, key, &iv)?;
    Ok(Envelope { ciphertext, iv })
}

/// Encrypt `plaintext` under `key` with a caller-supplied base64 IV.
///
/// Returns the base64 ciphertext (tag appended).
pub fn encrypt_with_iv(plaintext: &str, key: &SymmetricKey, iv: &str) -> Result<String> {
    let iv_bytes = from_base64(iv)?;
    if iv_bytes.len() != IV_LEN {
        return Err(VaultError::InvalidEncoding(format!(
            "IV must be {IV_LEN} bytes, got {}",
            iv_bytes.len()
        )));
    }
    let nonce = Nonce::from_slice(&iv_bytes);

    let ciphertext = key
        .cipher()
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| VaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    Ok(to_base64(&ciphertext))
}

/// Decrypt a base64 ciphertext produced by `encrypt` or `encrypt_with_iv`.
///
/// Any failure to verify, including undecodable input or an IV of the
/// wrong length, is reported as `DecryptionFailed`.
pub fn decrypt(ciphertext: &str, iv: &str, key: &SymmetricKey) -> Result<String> {
    let iv_bytes = from_base64(iv).map_err(|_| VaultError::DecryptionFailed)?;
    if iv_bytes.len() != IV_LEN {
        return Err(VaultError::DecryptionFailed);
    }
    let ciphertext_bytes = from_base64(ciphertext).map_err(|_| VaultError::DecryptionFailed)?;

    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(&iv_bytes), ciphertext_bytes.as_slice())
        .map_err(|_| VaultError::DecryptionFailed)?;

    // Take ownership via from_utf8; wipe the bytes if they are not text.
    String::from_utf8(plaintext).map_err(|e| {
        let mut bad_bytes = e.into_bytes();
        bad_bytes.zeroize();
        VaultError::InvalidEncoding("decrypted field is not valid UTF-8".to_string())
    })
}
