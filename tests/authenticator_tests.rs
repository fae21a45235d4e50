//! Integration tests for the authenticator gateway.

mod common;

use std::time::Duration;

use common::{deny, gateway, TestAuthenticator, RP_ID};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use housevault::authenticator::auth_data::{rp_id_hash, AuthenticatorData, FLAG_BE, FLAG_UV};
use housevault::authenticator::display::display_name_for_user_agent;
use housevault::authenticator::{
    AssertionResponse, AttestationResponse, AuthenticatorGateway, RelyingParty,
};
use housevault::crypto::from_base64url;
use housevault::errors::VaultError;
use sha2::{Digest, Sha256};

const USER: &str = "user-1";
const EMAIL: &str = "alice@example.com";

#[tokio::test]
async fn registration_produces_a_platform_binding() {
    let gw = gateway(TestAuthenticator::approving());
    let binding = gw.register_authenticator(USER, EMAIL).await.unwrap();

    assert_eq!(from_base64url(&binding.credential_id).unwrap().len(), 32);
    assert!(!binding.public_key.is_empty());
    assert_eq!(binding.device_type, "platform");
    assert_eq!(binding.transports, vec!["internal"]);
    assert_eq!(binding.counter, 0);
    assert!(!binding.backed_up);
    assert!(binding.last_used_at.is_none());
}

#[tokio::test]
async fn backup_eligible_flag_marks_binding_backed_up() {
    let platform = TestAuthenticator::approving().tamper_attestation(|r: &mut AttestationResponse| {
        r.authenticator_data[32] |= FLAG_BE;
    });
    let binding = gateway(platform)
        .register_authenticator(USER, EMAIL)
        .await
        .unwrap();
    assert!(binding.backed_up);
}

#[tokio::test]
async fn cancelled_registration_is_registration_failed() {
    let gw = gateway(TestAuthenticator::new(deny));
    let err = gw.register_authenticator(USER, EMAIL).await.unwrap_err();
    assert!(matches!(err, VaultError::RegistrationFailed(_)));
}

#[tokio::test]
async fn unavailable_platform_cannot_register() {
    let gw = gateway(TestAuthenticator::unavailable());
    assert!(!gw.is_available().await);
    let err = gw.register_authenticator(USER, EMAIL).await.unwrap_err();
    assert!(matches!(err, VaultError::PlatformUnavailable));
    assert_eq!(gw.platform().registrations(), 0);
}

#[tokio::test]
async fn assertion_is_scoped_and_signature_verifies() {
    let gw = gateway(TestAuthenticator::approving());
    let binding = gw.register_authenticator(USER, EMAIL).await.unwrap();

    let result = gw
        .assert_presence(&[binding.credential_id.clone()])
        .await
        .unwrap();
    assert_eq!(result.credential_id, binding.credential_id);
    assert_eq!(result.counter, 1);

    let auth_data = from_base64url(&result.authenticator_data).unwrap();
    let parsed = AuthenticatorData::parse(&auth_data).unwrap();
    assert_eq!(parsed.rp_id_hash, rp_id_hash(RP_ID));
    assert!(parsed.user_present() && parsed.user_verified());

    let client_data = from_base64url(&result.client_data_json).unwrap();
    let mut signed = auth_data.clone();
    signed.extend_from_slice(&Sha256::digest(&client_data));

    let spki = from_base64url(&binding.public_key).unwrap();
    let raw: [u8; 32] = spki[spki.len() - 32..].try_into().unwrap();
    let verifying = VerifyingKey::from_bytes(&raw).unwrap();
    let signature = Signature::from_slice(&from_base64url(&result.signature).unwrap()).unwrap();
    assert!(verifying.verify(&signed, &signature).is_ok());
}

#[tokio::test]
async fn unscoped_assertion_uses_any_discoverable_credential() {
    let gw = gateway(TestAuthenticator::approving());
    let binding = gw.register_authenticator(USER, EMAIL).await.unwrap();
    let result = gw.assert_presence(&[]).await.unwrap();
    assert_eq!(result.credential_id, binding.credential_id);
}

#[tokio::test]
async fn assertion_without_matching_credential_fails() {
    let gw = gateway(TestAuthenticator::approving());
    gw.register_authenticator(USER, EMAIL).await.unwrap();

    let unknown = housevault::crypto::to_base64url(&[9u8; 32]);
    let err = gw.assert_presence(&[unknown]).await.unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn swapped_credential_id_is_rejected() {
    let platform = TestAuthenticator::approving().tamper_assertion(|r: &mut AssertionResponse| {
        r.raw_id = vec![1u8; 32];
    });
    let gw = gateway(platform);
    let binding = gw.register_authenticator(USER, EMAIL).await.unwrap();

    let err = gw.assert_presence(&[binding.credential_id]).await.unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn replayed_challenge_is_rejected() {
    let platform = TestAuthenticator::approving().tamper_assertion(|r: &mut AssertionResponse| {
        let mut client: serde_json::Value = serde_json::from_slice(&r.client_data_json).unwrap();
        client["challenge"] = serde_json::Value::String("AAAA".into());
        r.client_data_json = client.to_string().into_bytes();
    });
    let gw = gateway(platform);
    let binding = gw.register_authenticator(USER, EMAIL).await.unwrap();

    let err = gw.assert_presence(&[binding.credential_id]).await.unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn missing_user_verification_is_rejected() {
    let platform = TestAuthenticator::approving().tamper_assertion(|r: &mut AssertionResponse| {
        r.authenticator_data[32] &= !FLAG_UV;
    });
    let gw = gateway(platform);
    let binding = gw.register_authenticator(USER, EMAIL).await.unwrap();

    let err = gw.assert_presence(&[binding.credential_id]).await.unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn assertion_for_another_relying_party_is_rejected() {
    let platform = TestAuthenticator::approving().tamper_assertion(|r: &mut AssertionResponse| {
        r.authenticator_data[..32].copy_from_slice(&rp_id_hash("evil.example"));
    });
    let gw = gateway(platform);
    let own = gw.register_authenticator(USER, EMAIL).await.unwrap();

    let err = gw.assert_presence(&[own.credential_id]).await.unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn credentials_are_scoped_to_the_relying_party() {
    let platform = TestAuthenticator::approving();
    let gw = AuthenticatorGateway::new(
        platform,
        RelyingParty {
            id: "tracker.example.com".into(),
            name: "Tracker".into(),
        },
        Duration::from_secs(30),
    );
    gw.register_authenticator(USER, EMAIL).await.unwrap();
    assert_eq!(gw.relying_party().id, "tracker.example.com");
    assert!(gw.assert_presence(&[]).await.is_ok());
}

#[test]
fn display_names_follow_the_user_agent() {
    assert_eq!(
        display_name_for_user_agent("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"),
        "Face ID or Touch ID"
    );
    assert_eq!(
        display_name_for_user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"),
        "Windows Hello"
    );
}
