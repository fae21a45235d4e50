//! Text encodings for binary values that travel over JSON.
//!
//! Keys, IVs and ciphertexts use standard (padded) base64.  Authenticator
//! values (credential ids, public keys, signatures, client data) use
//! base64url without padding, the form browsers hand out.  The url decoder
//! accepts input with or without trailing `=` so values that picked up
//! padding somewhere along the way still decode.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::errors::{Result, VaultError};

/// base64url engine: never writes padding, tolerates it when reading.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as standard padded base64.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard padded base64.
pub fn from_base64(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| VaultError::InvalidEncoding(format!("base64: {e}")))
}

/// Encode bytes as unpadded base64url.
pub fn to_base64url(bytes: &[u8]) -> String {
    URL_SAFE_LENIENT.encode(bytes)
}

/// Decode base64url, with or without padding.
pub fn from_base64url(text: &str) -> Result<Vec<u8>> {
    URL_SAFE_LENIENT
        .decode(text)
        .map_err(|e| VaultError::InvalidEncoding(format!("base64url: {e}")))
}
