//! The vault session: unlock/lock protocol plus record encryption.
//!
//! `Vault` composes the three lower layers:
//! - `KeyCustody` for the persisted key and its session copy
//! - `AuthenticatorGateway` for passkey ceremonies
//! - the envelope codec, using the key held while unlocked
//!
//! Transitions take `&mut self`; only one vault-affecting action can be in
//! flight at a time.  Nothing is retried: a failed step surfaces its error,
//! records it as `last_error`, and leaves the state as it was.

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::authenticator::{AuthenticatorGateway, PlatformAuthenticator};
use crate::crypto::{decrypt, encrypt_with_iv, generate_iv, SymmetricKey};
use crate::custody::{KeyCustody, SessionCache};
use crate::errors::{Result, VaultError};
use crate::store::{
    require_account_id, AuthenticatorBinding, EncryptedCredentialData,
    EncryptedCredentialRecord, RemoteStore,
};

use super::provision;
use super::records::{DecryptedCredential, DecryptedField};
use super::state::{VaultState, VaultStatus};

/// `last_error` text when the platform reports no authenticator.
pub const PLATFORM_UNAVAILABLE_MESSAGE: &str =
    "Biometric authentication not available on this device";

/// A user's vault session.
pub struct Vault<S, C, A> {
    user_id: String,
    store: S,
    custody: KeyCustody<S, C>,
    gateway: AuthenticatorGateway<A>,

    state: VaultState,
    /// Present exactly when `state` is `Unlocked`.
    key: Option<SymmetricKey>,
    has_passkey: bool,
    last_error: Option<String>,
}

impl<S, C, A> Vault<S, C, A>
where
    S: RemoteStore,
    C: SessionCache,
    A: PlatformAuthenticator,
{
    pub fn new(
        user_id: impl Into<String>,
        store: S,
        session: C,
        gateway: AuthenticatorGateway<A>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            custody: KeyCustody::new(store.clone(), session),
            store,
            gateway,
            state: VaultState::Uninitialized,
            key: None,
            has_passkey: false,
            last_error: None,
        }
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> VaultState {
        self.state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state == VaultState::Unlocked
    }

    pub fn status(&self) -> VaultStatus {
        VaultStatus {
            state: self.state,
            has_passkey: self.has_passkey,
            last_error: self.last_error.clone(),
            authenticator_name: self.gateway.display_name(),
        }
    }

    pub fn custody(&self) -> &KeyCustody<S, C> {
        &self.custody
    }

    pub fn gateway(&self) -> &AuthenticatorGateway<A> {
        &self.gateway
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Load the session: which passkeys exist, and whether this session
    /// already holds a key.
    pub async fn init(&mut self) -> Result<VaultState> {
        if !self.gateway.is_available().await {
            self.last_error = Some(PLATFORM_UNAVAILABLE_MESSAGE.to_string());
        }

        let bindings = self.store.list_bindings(&self.user_id).await.map_err(|e| {
            warn!(user_id = %self.user_id, error = %e, "listing passkeys failed during init");
            self.last_error = Some(e.to_string());
            e
        })?;
        self.has_passkey = !bindings.is_empty();

        if let Some(encoded) = self.custody.cached()? {
            match SymmetricKey::import(&encoded) {
                Ok(key) => {
                    self.key = Some(key);
                    self.state = VaultState::Unlocked;
                    info!(user_id = %self.user_id, "vault unlocked from session cache");
                    return Ok(self.state);
                }
                Err(e) => {
                    warn!(user_id = %self.user_id, error = %e, "discarding unusable session key");
                    self.custody.clear_cache()?;
                }
            }
        }

        self.state = self.resting_state();
        debug!(user_id = %self.user_id, state = %self.state, "vault initialized");
        Ok(self.state)
    }

    /// Enroll a passkey on this device and unlock.
    ///
    /// Reuses the persisted key when one exists; otherwise this is the only
    /// path that creates and persists a key.
    pub async fn setup(&mut self, user_email: &str) -> Result<()> {
        if self.state == VaultState::Uninitialized {
            return Err(VaultError::NotInitialized);
        }
        let outcome = self.run_setup(user_email).await;
        self.record_outcome(outcome)
    }

    async fn run_setup(&mut self, user_email: &str) -> Result<()> {
        if !self.gateway.is_available().await {
            return Err(VaultError::PlatformUnavailable);
        }

        let key = match self.custody.fetch_persisted_key(&self.user_id).await? {
            Some(encoded) => {
                debug!(user_id = %self.user_id, "reusing persisted key");
                SymmetricKey::import(&encoded)?
            }
            None => {
                let key = provision::generate_key();
                self.custody.persist_key(&self.user_id, &key.export()).await?;
                info!(user_id = %self.user_id, "generated and persisted a new vault key");
                key
            }
        };

        let binding = self
            .gateway
            .register_authenticator(&self.user_id, user_email)
            .await?;
        self.store.insert_binding(&self.user_id, &binding).await?;

        self.custody.cache(&key.export())?;
        self.key = Some(key);
        self.has_passkey = true;
        self.state = VaultState::Unlocked;
        info!(
            user_id = %self.user_id,
            credential_id = %binding.credential_id,
            "passkey registered, vault unlocked"
        );
        Ok(())
    }

    /// Prove presence with a registered passkey and unlock.
    pub async fn unlock(&mut self) -> Result<()> {
        match self.state {
            VaultState::Uninitialized => return Err(VaultError::NotInitialized),
            VaultState::Unlocked => return Ok(()),
            VaultState::NoAuthenticator | VaultState::Locked => {}
        }
        let outcome = self.run_unlock().await;
        self.record_outcome(outcome)
    }

    async fn run_unlock(&mut self) -> Result<()> {
        let bindings = self.store.list_bindings(&self.user_id).await?;
        if bindings.is_empty() {
            self.has_passkey = false;
            self.state = VaultState::NoAuthenticator;
            return Err(VaultError::NoPasskeyRegistered);
        }
        self.has_passkey = true;

        let allowed: Vec<String> = bindings.iter().map(|b| b.credential_id.clone()).collect();
        let assertion = self.gateway.assert_presence(&allowed).await?;

        let binding = bindings
            .iter()
            .find(|b| b.credential_id == assertion.credential_id)
            .ok_or_else(|| {
                VaultError::AuthenticationFailed("assertion used an unknown passkey".into())
            })?;
        check_counter(binding, assertion.counter)?;

        let encoded = self
            .custody
            .fetch_persisted_key(&self.user_id)
            .await?
            .ok_or_else(|| {
                error!(user_id = %self.user_id, "passkey verified but no persisted key exists");
                VaultError::KeyMissing
            })?;
        let key = SymmetricKey::import(&encoded)?;

        self.store
            .record_use(
                &self.user_id,
                &assertion.credential_id,
                assertion.counter,
                Utc::now(),
            )
            .await?;

        self.custody.cache(&encoded)?;
        self.key = Some(key);
        self.state = VaultState::Unlocked;
        info!(user_id = %self.user_id, "vault unlocked");
        Ok(())
    }

    /// Forget the session key.  No network calls.
    pub fn lock(&mut self) -> Result<()> {
        self.key = None;
        if self.state != VaultState::Uninitialized {
            self.state = self.resting_state();
        }
        self.custody.clear_cache()?;
        info!(user_id = %self.user_id, "vault locked");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    /// Encrypt one account's fields under a single fresh IV.  Empty fields
    /// are stored as `None`.
    pub fn encrypt_credentials(
        &self,
        username: &str,
        password: &str,
        notes: &str,
    ) -> Result<EncryptedCredentialData> {
        let key = self.require_key()?;
        let iv = generate_iv();
        let seal = |text: &str| -> Result<Option<String>> {
            if text.is_empty() {
                Ok(None)
            } else {
                encrypt_with_iv(text, key, &iv).map(Some)
            }
        };

        Ok(EncryptedCredentialData {
            username_encrypted: seal(username)?,
            password_encrypted: seal(password)?,
            notes_encrypted: seal(notes)?,
            iv: iv.clone(),
        })
    }

    /// Decrypt each field independently.  A field that fails verification
    /// comes back `Unreadable`; the vault stays unlocked.
    pub fn decrypt_credentials(&self, data: &EncryptedCredentialData) -> Result<DecryptedCredential> {
        let key = self.require_key()?;
        let open = |name: &str, field: &Option<String>| match field {
            None => DecryptedField::value(""),
            Some(ciphertext) => match decrypt(ciphertext, &data.iv, key) {
                Ok(text) => DecryptedField::value(text),
                Err(e) => {
                    warn!(field = name, error = %e, "credential field failed to decrypt");
                    DecryptedField::Unreadable
                }
            },
        };

        Ok(DecryptedCredential {
            username: open("username", &data.username_encrypted),
            password: open("password", &data.password_encrypted),
            notes: open("notes", &data.notes_encrypted),
        })
    }

    /// Encrypt and store an account's credentials.
    pub async fn save_credentials(
        &self,
        account_id: &str,
        username: &str,
        password: &str,
        notes: &str,
    ) -> Result<EncryptedCredentialRecord> {
        require_account_id(account_id)?;
        let data = self.encrypt_credentials(username, password, notes)?;
        let record = self
            .store
            .upsert_record(&self.user_id, account_id, &data)
            .await?;
        debug!(user_id = %self.user_id, account_id, "saved credentials");
        Ok(record)
    }

    /// Fetch and decrypt an account's credentials, if any are stored.
    pub async fn load_credentials(&self, account_id: &str) -> Result<Option<DecryptedCredential>> {
        self.require_key()?;
        let Some(record) = self.store.get_record(&self.user_id, account_id).await? else {
            return Ok(None);
        };
        self.decrypt_credentials(&record.data).map(Some)
    }

    pub async fn forget_credentials(&self, account_id: &str) -> Result<()> {
        self.store.delete_record(&self.user_id, account_id).await?;
        debug!(user_id = %self.user_id, account_id, "deleted credentials");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Passkeys
    // ------------------------------------------------------------------

    /// Registered passkeys, newest first.
    pub async fn authenticators(&self) -> Result<Vec<AuthenticatorBinding>> {
        self.store.list_bindings(&self.user_id).await
    }

    /// Delete a registered passkey.  A locked vault with no passkey left
    /// falls back to `NoAuthenticator`.
    pub async fn remove_authenticator(&mut self, credential_id: &str) -> Result<()> {
        self.store
            .delete_binding(&self.user_id, credential_id)
            .await?;
        self.has_passkey = !self.store.list_bindings(&self.user_id).await?.is_empty();
        if self.state == VaultState::Locked && !self.has_passkey {
            self.state = VaultState::NoAuthenticator;
        }
        info!(user_id = %self.user_id, credential_id, "passkey removed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn require_key(&self) -> Result<&SymmetricKey> {
        match (&self.state, &self.key) {
            (VaultState::Unlocked, Some(key)) => Ok(key),
            (VaultState::Uninitialized, _) => Err(VaultError::NotInitialized),
            _ => Err(VaultError::VaultLocked),
        }
    }

    fn resting_state(&self) -> VaultState {
        if self.has_passkey {
            VaultState::Locked
        } else {
            VaultState::NoAuthenticator
        }
    }

    fn record_outcome(&mut self, outcome: Result<()>) -> Result<()> {
        match &outcome {
            Ok(()) => self.last_error = None,
            Err(e) => {
                warn!(user_id = %self.user_id, error = %e, "vault operation failed");
                self.last_error = Some(e.to_string());
            }
        }
        outcome
    }
}

/// Reject an assertion whose counter went backwards.  Authenticators that
/// do not count report zero and are accepted.
fn check_counter(binding: &AuthenticatorBinding, counter: u32) -> Result<()> {
    if binding.counter != 0 && counter != 0 && counter <= binding.counter {
        warn!(
            credential_id = %binding.credential_id,
            stored = binding.counter,
            received = counter,
            "signature counter did not advance"
        );
        return Err(VaultError::AuthenticationFailed(
            "signature counter did not advance; the passkey may be cloned".into(),
        ));
    }
    Ok(())
}
