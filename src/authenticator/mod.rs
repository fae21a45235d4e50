//! Authenticator gateway: platform passkey ceremonies as two operations.
//!
//! `PlatformAuthenticator` is the raw capability the host provides (a
//! browser's WebAuthn API, an OS biometric service, or the bundled
//! `SoftwareAuthenticator`).  `AuthenticatorGateway` wraps it:
//! - `register_authenticator`: create a discoverable, user-verified
//!   platform credential and turn the result into an `AuthenticatorBinding`
//! - `assert_presence`: run a user-verified assertion scoped to the given
//!   credential ids and return the `AssertionResult`
//!
//! Each ceremony gets a fresh 32-byte random challenge.  The gateway
//! checks what comes back (challenge echo, ceremony type, rp id hash,
//! UP/UV flags, allow-list membership) before reporting success.

pub mod auth_data;
pub mod display;
pub mod software;

use std::time::Duration;

use chrono::Utc;
use rand::RngCore;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::crypto::{from_base64url, to_base64url};
use crate::errors::{Result, VaultError};
use crate::store::AuthenticatorBinding;

pub use auth_data::AuthenticatorData;
pub use software::{SoftwareAuthenticator, UserVerifier};

/// Length of every ceremony challenge in bytes.
pub const CHALLENGE_LEN: usize = 32;

/// Default ceremony timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// The relying party the credentials are scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

/// Public-key algorithms, by COSE identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoseAlgorithm {
    Es256,
    EdDsa,
    Rs256,
}

impl CoseAlgorithm {
    pub fn cose_id(self) -> i32 {
        match self {
            Self::Es256 => -7,
            Self::EdDsa => -8,
            Self::Rs256 => -257,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatorAttachment {
    Platform,
    CrossPlatform,
}

impl AuthenticatorAttachment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::CrossPlatform => "cross-platform",
        }
    }
}

/// Requirement level for user verification and resident keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Preferred,
    Discouraged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationConveyance {
    None,
    Indirect,
    Direct,
}

/// The user account a new credential is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntity {
    /// Opaque user handle (the user id bytes).
    pub id: Vec<u8>,
    pub name: String,
    pub display_name: String,
}

/// Options for a credential creation ceremony.
#[derive(Debug, Clone)]
pub struct RegistrationOptions {
    pub challenge: Vec<u8>,
    pub rp: RelyingParty,
    pub user: UserEntity,
    /// Acceptable algorithms, most preferred first.
    pub algorithms: Vec<CoseAlgorithm>,
    pub attachment: AuthenticatorAttachment,
    pub user_verification: Requirement,
    pub resident_key: Requirement,
    pub attestation: AttestationConveyance,
    pub timeout: Duration,
}

/// What a creation ceremony hands back.
#[derive(Debug, Clone)]
pub struct AttestationResponse {
    pub raw_id: Vec<u8>,
    /// SubjectPublicKeyInfo DER of the new credential, when available.
    pub public_key: Option<Vec<u8>>,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub attachment: Option<AuthenticatorAttachment>,
    pub transports: Vec<String>,
}

/// A credential the assertion may use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDescriptor {
    pub id: Vec<u8>,
    pub transports: Vec<String>,
}

/// Options for an assertion ceremony.
#[derive(Debug, Clone)]
pub struct AssertionOptions {
    pub challenge: Vec<u8>,
    pub rp_id: String,
    pub user_verification: Requirement,
    /// Empty means any discoverable credential for the rp.
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub timeout: Duration,
}

/// What an assertion ceremony hands back.
#[derive(Debug, Clone)]
pub struct AssertionResponse {
    pub raw_id: Vec<u8>,
    pub signature: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub client_data_json: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
}

/// Outcome of a successful `assert_presence`, all binary values base64url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResult {
    pub credential_id: String,
    pub signature: String,
    pub authenticator_data: String,
    pub client_data_json: String,
    pub counter: u32,
}

/// Failures reported by a platform authenticator.
#[derive(Debug, Error)]
pub enum CeremonyError {
    /// The user dismissed the prompt, denied verification, or it timed out.
    #[error("the operation was cancelled or not allowed: {0}")]
    NotAllowed(String),

    #[error("no matching credential is available on this device")]
    NoCredentials,

    #[error("no platform authenticator is available")]
    NotSupported,

    #[error("{0}")]
    Failed(String),
}

/// A platform authenticator capability.
#[allow(async_fn_in_trait)]
pub trait PlatformAuthenticator {
    /// Whether a user-verifying platform authenticator is present.
    async fn is_available(&self) -> bool;

    async fn create_credential(
        &self,
        options: &RegistrationOptions,
    ) -> std::result::Result<AttestationResponse, CeremonyError>;

    async fn get_assertion(
        &self,
        options: &AssertionOptions,
    ) -> std::result::Result<AssertionResponse, CeremonyError>;

    /// Label for UI copy ("Touch ID", "Windows Hello", ...).
    fn display_name(&self) -> String {
        display::native_display_name().to_string()
    }
}

#[derive(Deserialize)]
struct ClientData {
    #[serde(rename = "type")]
    kind: String,
    challenge: String,
}

/// Wraps a `PlatformAuthenticator` with the vault's ceremony policy.
pub struct AuthenticatorGateway<A> {
    platform: A,
    rp: RelyingParty,
    timeout: Duration,
}

impl<A: PlatformAuthenticator> AuthenticatorGateway<A> {
    pub fn new(platform: A, rp: RelyingParty, timeout: Duration) -> Self {
        Self {
            platform,
            rp,
            timeout,
        }
    }

    pub fn platform(&self) -> &A {
        &self.platform
    }

    pub fn relying_party(&self) -> &RelyingParty {
        &self.rp
    }

    pub async fn is_available(&self) -> bool {
        self.platform.is_available().await
    }

    pub fn display_name(&self) -> String {
        self.platform.display_name()
    }

    /// Enroll a platform authenticator for the user.
    pub async fn register_authenticator(
        &self,
        user_id: &str,
        user_email: &str,
    ) -> Result<AuthenticatorBinding> {
        if !self.platform.is_available().await {
            return Err(VaultError::PlatformUnavailable);
        }

        let challenge = new_challenge();
        let options = RegistrationOptions {
            challenge: challenge.clone(),
            rp: self.rp.clone(),
            user: UserEntity {
                id: user_id.as_bytes().to_vec(),
                name: user_email.to_string(),
                display_name: user_email.to_string(),
            },
            algorithms: vec![CoseAlgorithm::Es256, CoseAlgorithm::Rs256, CoseAlgorithm::EdDsa],
            attachment: AuthenticatorAttachment::Platform,
            user_verification: Requirement::Required,
            resident_key: Requirement::Required,
            attestation: AttestationConveyance::None,
            timeout: self.timeout,
        };

        let response = self
            .platform
            .create_credential(&options)
            .await
            .map_err(|e| match e {
                CeremonyError::NotSupported => VaultError::PlatformUnavailable,
                other => VaultError::RegistrationFailed(other.to_string()),
            })?;

        check_client_data(&response.client_data_json, "webauthn.create", &challenge)
            .map_err(VaultError::RegistrationFailed)?;
        let auth_data = self
            .check_authenticator_data(&response.authenticator_data)
            .map_err(VaultError::RegistrationFailed)?;

        if response.raw_id.is_empty() {
            return Err(VaultError::RegistrationFailed(
                "authenticator returned an empty credential id".into(),
            ));
        }
        let public_key = response.public_key.ok_or_else(|| {
            VaultError::RegistrationFailed("Failed to get public key".into())
        })?;

        let binding = AuthenticatorBinding {
            credential_id: to_base64url(&response.raw_id),
            public_key: to_base64url(&public_key),
            counter: auth_data.sign_count,
            device_type: response
                .attachment
                .unwrap_or(AuthenticatorAttachment::Platform)
                .as_str()
                .to_string(),
            backed_up: auth_data.backup_eligible(),
            transports: response.transports,
            created_at: Utc::now(),
            last_used_at: None,
        };
        debug!(credential_id = %binding.credential_id, "registered platform authenticator");
        Ok(binding)
    }

    /// Prove user presence with one of `allowed_credential_ids` (base64url),
    /// or any discoverable credential when the list is empty.
    pub async fn assert_presence(&self, allowed_credential_ids: &[String]) -> Result<AssertionResult> {
        let mut allow_credentials = Vec::with_capacity(allowed_credential_ids.len());
        for id in allowed_credential_ids {
            let raw = from_base64url(id).map_err(|e| {
                VaultError::AuthenticationFailed(format!("stored credential id is malformed: {e}"))
            })?;
            allow_credentials.push(CredentialDescriptor {
                id: raw,
                transports: vec!["internal".to_string()],
            });
        }

        let challenge = new_challenge();
        let options = AssertionOptions {
            challenge: challenge.clone(),
            rp_id: self.rp.id.clone(),
            user_verification: Requirement::Required,
            allow_credentials,
            timeout: self.timeout,
        };

        let response = self
            .platform
            .get_assertion(&options)
            .await
            .map_err(|e| match e {
                CeremonyError::NotSupported => VaultError::PlatformUnavailable,
                other => VaultError::AuthenticationFailed(other.to_string()),
            })?;

        if !options.allow_credentials.is_empty()
            && !options
                .allow_credentials
                .iter()
                .any(|d| d.id == response.raw_id)
        {
            warn!("assertion used a credential outside the allow list");
            return Err(VaultError::AuthenticationFailed(
                "authenticator used an unexpected credential".into(),
            ));
        }

        check_client_data(&response.client_data_json, "webauthn.get", &challenge)
            .map_err(VaultError::AuthenticationFailed)?;
        let auth_data = self
            .check_authenticator_data(&response.authenticator_data)
            .map_err(VaultError::AuthenticationFailed)?;

        Ok(AssertionResult {
            credential_id: to_base64url(&response.raw_id),
            signature: to_base64url(&response.signature),
            authenticator_data: to_base64url(&response.authenticator_data),
            client_data_json: to_base64url(&response.client_data_json),
            counter: auth_data.sign_count,
        })
    }

    /// Parse authenticator data and enforce rp scope and UP/UV.
    fn check_authenticator_data(&self, bytes: &[u8]) -> std::result::Result<AuthenticatorData, String> {
        let data = AuthenticatorData::parse(bytes).map_err(|e| e.to_string())?;
        if !data.matches_rp(&self.rp.id) {
            return Err("authenticator data is for a different relying party".into());
        }
        if !data.user_present() || !data.user_verified() {
            return Err("user verification was not performed".into());
        }
        Ok(data)
    }
}

/// A fresh single-use ceremony challenge.
pub fn new_challenge() -> Vec<u8> {
    let mut challenge = vec![0u8; CHALLENGE_LEN];
    rand::rng().fill_bytes(&mut challenge);
    challenge
}

/// Verify the client data names the expected ceremony and echoes our challenge.
fn check_client_data(
    client_data_json: &[u8],
    expected_type: &str,
    challenge: &[u8],
) -> std::result::Result<(), String> {
    let client_data: ClientData = serde_json::from_slice(client_data_json)
        .map_err(|e| format!("client data is not valid JSON: {e}"))?;
    if client_data.kind != expected_type {
        return Err(format!(
            "unexpected ceremony type '{}', expected '{expected_type}'",
            client_data.kind
        ));
    }
    let echoed = from_base64url(&client_data.challenge).map_err(|e| e.to_string())?;
    if echoed != challenge {
        return Err("challenge mismatch".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenges_are_32_random_bytes() {
        let a = new_challenge();
        let b = new_challenge();
        assert_eq!(a.len(), CHALLENGE_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn client_data_must_echo_challenge() {
        let challenge = new_challenge();
        let json = serde_json::json!({
            "type": "webauthn.get",
            "challenge": to_base64url(&challenge),
            "origin": "https://localhost",
        })
        .to_string();
        assert!(check_client_data(json.as_bytes(), "webauthn.get", &challenge).is_ok());
        assert!(check_client_data(json.as_bytes(), "webauthn.create", &challenge).is_err());
        assert!(check_client_data(json.as_bytes(), "webauthn.get", &new_challenge()).is_err());
    }

    #[test]
    fn cose_ids() {
        assert_eq!(CoseAlgorithm::Es256.cose_id(), -7);
        assert_eq!(CoseAlgorithm::EdDsa.cose_id(), -8);
        assert_eq!(CoseAlgorithm::Rs256.cose_id(), -257);
    }
}
