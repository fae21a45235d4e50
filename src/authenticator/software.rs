//! Software platform authenticator.
//!
//! Holds Ed25519 passkeys either in memory or in an owner-only JSON file
//! and gates every ceremony on a `UserVerifier`.  The CLI uses it as the
//! platform authenticator on hosts with no WebAuthn API; tests use it
//! with scripted verifiers.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use super::auth_data::{rp_id_hash, AuthenticatorData, FLAG_UP, FLAG_UV};
use super::{
    AssertionOptions, AssertionResponse, AttestationResponse, AuthenticatorAttachment,
    CeremonyError, CoseAlgorithm, PlatformAuthenticator, RegistrationOptions,
};
use crate::crypto::{from_base64url, to_base64url};
use crate::errors::{Result, VaultError};

/// DER prefix of an Ed25519 SubjectPublicKeyInfo; the 32 key bytes follow.
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

const CREDENTIAL_ID_LEN: usize = 32;

/// Decides whether the user approved a ceremony.
pub trait UserVerifier {
    fn verify(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> UserVerifier for F {
    fn verify(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCredential {
    id: String,
    rp_id: String,
    user_handle: String,
    user_name: String,
    secret: String,
    sign_count: u32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Keystore {
    credentials: Vec<StoredCredential>,
}

/// An Ed25519 passkey authenticator implemented in software.
pub struct SoftwareAuthenticator<V> {
    verifier: V,
    path: Option<PathBuf>,
    keystore: Mutex<Keystore>,
    available: bool,
}

impl<V: UserVerifier> SoftwareAuthenticator<V> {
    /// Authenticator whose passkeys live only as long as the value.
    pub fn in_memory(verifier: V) -> Self {
        Self {
            verifier,
            path: None,
            keystore: Mutex::new(Keystore::default()),
            available: true,
        }
    }

    /// Authenticator backed by the keystore file at `path`, created on first
    /// registration.
    pub fn open(path: &Path, verifier: V) -> Result<Self> {
        let keystore = if path.exists() {
            let text = fs::read_to_string(path)?;
            serde_json::from_str(&text).map_err(|e| {
                VaultError::SerializationError(format!(
                    "authenticator keystore {} is corrupt: {e}",
                    path.display()
                ))
            })?
        } else {
            Keystore::default()
        };

        Ok(Self {
            verifier,
            path: Some(path.to_path_buf()),
            keystore: Mutex::new(keystore),
            available: true,
        })
    }

    /// Report the platform authenticator as absent.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Number of passkeys held for `rp_id`.
    pub fn credential_count(&self, rp_id: &str) -> usize {
        self.keystore
            .lock()
            .map(|ks| ks.credentials.iter().filter(|c| c.rp_id == rp_id).count())
            .unwrap_or(0)
    }

    fn save(&self, keystore: &Keystore) -> std::result::Result<(), CeremonyError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(keystore)
            .map_err(|e| CeremonyError::Failed(format!("failed to serialize keystore: {e}")))?;

        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, json.as_bytes())?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
            }
            fs::rename(&tmp, path)
        };
        write().map_err(|e| CeremonyError::Failed(format!("failed to write keystore: {e}")))
    }
}

impl<V: UserVerifier> PlatformAuthenticator for SoftwareAuthenticator<V> {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn create_credential(
        &self,
        options: &RegistrationOptions,
    ) -> std::result::Result<AttestationResponse, CeremonyError> {
        if !self.available {
            return Err(CeremonyError::NotSupported);
        }
        if !options.algorithms.contains(&CoseAlgorithm::EdDsa) {
            return Err(CeremonyError::Failed(
                "none of the requested algorithms are supported".into(),
            ));
        }

        let prompt = format!(
            "Register new passkey\n\nSite: {} ({})\nAccount: {}",
            options.rp.name, options.rp.id, options.user.display_name
        );
        if !self.verifier.verify(&prompt) {
            return Err(CeremonyError::NotAllowed("user denied registration".into()));
        }

        let mut secret = Zeroizing::new([0u8; 32]);
        rand::rng().fill_bytes(&mut secret[..]);
        let signing_key = SigningKey::from_bytes(&secret);

        let mut id = vec![0u8; CREDENTIAL_ID_LEN];
        rand::rng().fill_bytes(&mut id);

        let mut public_key = ED25519_SPKI_PREFIX.to_vec();
        public_key.extend_from_slice(signing_key.verifying_key().as_bytes());

        let auth_data = AuthenticatorData {
            rp_id_hash: rp_id_hash(&options.rp.id),
            flags: FLAG_UP | FLAG_UV,
            sign_count: 0,
        };
        let client_data_json =
            client_data("webauthn.create", &options.challenge, &options.rp.id);

        {
            let mut keystore = self
                .keystore
                .lock()
                .map_err(|_| CeremonyError::Failed("keystore lock poisoned".into()))?;
            keystore.credentials.push(StoredCredential {
                id: to_base64url(&id),
                rp_id: options.rp.id.clone(),
                user_handle: to_base64url(&options.user.id),
                user_name: options.user.name.clone(),
                secret: to_base64url(&secret[..]),
                sign_count: 0,
                created_at: Utc::now(),
            });
            self.save(&keystore)?;
        }
        debug!(rp_id = %options.rp.id, "created software passkey");

        Ok(AttestationResponse {
            raw_id: id,
            public_key: Some(public_key),
            authenticator_data: auth_data.to_bytes(),
            client_data_json,
            attachment: Some(AuthenticatorAttachment::Platform),
            transports: vec!["internal".to_string()],
        })
    }

    async fn get_assertion(
        &self,
        options: &AssertionOptions,
    ) -> std::result::Result<AssertionResponse, CeremonyError> {
        if !self.available {
            return Err(CeremonyError::NotSupported);
        }

        let allowed: Vec<String> = options
            .allow_credentials
            .iter()
            .map(|d| to_base64url(&d.id))
            .collect();

        let mut keystore = self
            .keystore
            .lock()
            .map_err(|_| CeremonyError::Failed("keystore lock poisoned".into()))?;

        // Newest matching passkey wins.
        let index = keystore
            .credentials
            .iter()
            .rposition(|c| {
                c.rp_id == options.rp_id && (allowed.is_empty() || allowed.contains(&c.id))
            })
            .ok_or(CeremonyError::NoCredentials)?;

        let prompt = format!(
            "Sign in with passkey\n\nSite: {}\nAccount: {}",
            options.rp_id, keystore.credentials[index].user_name
        );
        if !self.verifier.verify(&prompt) {
            return Err(CeremonyError::NotAllowed("user denied verification".into()));
        }

        let credential = &mut keystore.credentials[index];
        let decoded = Zeroizing::new(
            from_base64url(&credential.secret)
                .map_err(|e| CeremonyError::Failed(format!("stored passkey is corrupt: {e}")))?,
        );
        if decoded.len() != 32 {
            return Err(CeremonyError::Failed("stored passkey has the wrong length".into()));
        }
        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&decoded);
        let signing_key = SigningKey::from_bytes(&secret);

        credential.sign_count = credential.sign_count.wrapping_add(1);
        let auth_data = AuthenticatorData {
            rp_id_hash: rp_id_hash(&options.rp_id),
            flags: FLAG_UP | FLAG_UV,
            sign_count: credential.sign_count,
        }
        .to_bytes();
        let client_data_json = client_data("webauthn.get", &options.challenge, &options.rp_id);

        let mut signed = auth_data.clone();
        signed.extend_from_slice(&Sha256::digest(&client_data_json));
        let signature = signing_key.sign(&signed);

        let raw_id = from_base64url(&credential.id)
            .map_err(|e| CeremonyError::Failed(format!("stored passkey id is corrupt: {e}")))?;
        let user_handle = from_base64url(&credential.user_handle).ok();

        self.save(&keystore)?;

        Ok(AssertionResponse {
            raw_id,
            signature: signature.to_bytes().to_vec(),
            authenticator_data: auth_data,
            client_data_json,
            user_handle,
        })
    }

    fn display_name(&self) -> String {
        "Software Passkey".to_string()
    }
}

fn client_data(kind: &str, challenge: &[u8], rp_id: &str) -> Vec<u8> {
    serde_json::json!({
        "type": kind,
        "challenge": to_base64url(challenge),
        "origin": format!("https://{rp_id}"),
        "crossOrigin": false,
    })
    .to_string()
    .into_bytes()
}
