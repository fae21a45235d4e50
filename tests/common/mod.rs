//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use housevault::authenticator::{
    AssertionOptions, AssertionResponse, AttestationResponse, AuthenticatorGateway,
    CeremonyError, PlatformAuthenticator, RegistrationOptions, RelyingParty,
    SoftwareAuthenticator,
};
use housevault::custody::MemorySessionCache;
use housevault::store::MemoryStore;
use housevault::vault::Vault;

pub type Verifier = fn(&str) -> bool;

pub const RP_ID: &str = "localhost";

pub fn approve(_: &str) -> bool {
    true
}

pub fn deny(_: &str) -> bool {
    false
}

pub fn rp() -> RelyingParty {
    RelyingParty {
        id: RP_ID.to_string(),
        name: "House Vault".to_string(),
    }
}

/// Software authenticator that counts ceremonies and can rewrite the
/// responses it hands back.
pub struct TestAuthenticator {
    inner: SoftwareAuthenticator<Verifier>,
    registrations: AtomicUsize,
    assertions: AtomicUsize,
    tamper_attestation: Option<fn(&mut AttestationResponse)>,
    tamper_assertion: Option<fn(&mut AssertionResponse)>,
}

impl TestAuthenticator {
    pub fn new(verifier: Verifier) -> Self {
        Self::wrap(SoftwareAuthenticator::in_memory(verifier))
    }

    pub fn approving() -> Self {
        Self::new(approve)
    }

    pub fn unavailable() -> Self {
        Self::wrap(SoftwareAuthenticator::in_memory(approve as Verifier).unavailable())
    }

    fn wrap(inner: SoftwareAuthenticator<Verifier>) -> Self {
        Self {
            inner,
            registrations: AtomicUsize::new(0),
            assertions: AtomicUsize::new(0),
            tamper_attestation: None,
            tamper_assertion: None,
        }
    }

    pub fn tamper_attestation(mut self, f: fn(&mut AttestationResponse)) -> Self {
        self.tamper_attestation = Some(f);
        self
    }

    pub fn tamper_assertion(mut self, f: fn(&mut AssertionResponse)) -> Self {
        self.tamper_assertion = Some(f);
        self
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn assertions(&self) -> usize {
        self.assertions.load(Ordering::SeqCst)
    }
}

impl PlatformAuthenticator for TestAuthenticator {
    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn create_credential(
        &self,
        options: &RegistrationOptions,
    ) -> Result<AttestationResponse, CeremonyError> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        let mut response = self.inner.create_credential(options).await?;
        if let Some(f) = self.tamper_attestation {
            f(&mut response);
        }
        Ok(response)
    }

    async fn get_assertion(
        &self,
        options: &AssertionOptions,
    ) -> Result<AssertionResponse, CeremonyError> {
        self.assertions.fetch_add(1, Ordering::SeqCst);
        let mut response = self.inner.get_assertion(options).await?;
        if let Some(f) = self.tamper_assertion {
            f(&mut response);
        }
        Ok(response)
    }
}

pub fn gateway(platform: TestAuthenticator) -> AuthenticatorGateway<TestAuthenticator> {
    AuthenticatorGateway::new(platform, rp(), Duration::from_secs(60))
}

pub type TestVault = Vault<MemoryStore, MemorySessionCache, TestAuthenticator>;

/// A vault for `user_id` on one "device": its own session and authenticator,
/// sharing `store` with every other device.
pub fn device(user_id: &str, store: &MemoryStore, platform: TestAuthenticator) -> TestVault {
    Vault::new(
        user_id,
        store.clone(),
        MemorySessionCache::new(),
        gateway(platform),
    )
}

/// A vault whose `init` already ran.
pub async fn initialized_device(user_id: &str, store: &MemoryStore) -> TestVault {
    let mut vault = device(user_id, store, TestAuthenticator::approving());
    vault.init().await.expect("init");
    vault
}
