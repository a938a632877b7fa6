//! Identity token verification against a mocked identity provider.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use huddle_service::auth::{IdentityVerifier, JwksClient, JwtIdentityVerifier};
use huddle_service::errors::HuddleError;
use huddle_test_utils::{MockIdentityProvider, TestHuddleServer, TestKeypair, TestTokenBuilder};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const CLOCK_SKEW: Duration = Duration::from_secs(300);

fn verifier_for(idp: &MockIdentityProvider) -> JwtIdentityVerifier {
    JwtIdentityVerifier::new(Arc::new(JwksClient::new(idp.jwks_url())), CLOCK_SKEW)
}

fn is_invalid_token<T>(result: &Result<T, HuddleError>) -> bool {
    matches!(result, Err(HuddleError::InvalidToken(_)))
}

#[tokio::test]
async fn test_valid_token_yields_subject() {
    let idp = MockIdentityProvider::start().await;
    let verifier = verifier_for(&idp);

    let identity = verifier.verify(&idp.token_for("u-alice")).await.unwrap();
    assert_eq!(identity.subject, "u-alice");
}

#[tokio::test]
async fn test_key_set_is_cached_between_verifications() {
    let idp = MockIdentityProvider::start().await;
    let verifier = verifier_for(&idp);

    verifier.verify(&idp.token_for("u-alice")).await.unwrap();
    verifier.verify(&idp.token_for("u-bob")).await.unwrap();

    let requests = idp.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(verifier.jwks_client().is_warm().await);
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let idp = MockIdentityProvider::start().await;
    let verifier = verifier_for(&idp);

    let token = TestTokenBuilder::new()
        .for_subject("u-alice")
        .expires_in(-3600)
        .sign_with(&idp.keypair);
    assert!(is_invalid_token(&verifier.verify(&token).await));
}

#[tokio::test]
async fn test_token_signed_with_other_key_rejected() {
    let idp = MockIdentityProvider::start().await;
    let verifier = verifier_for(&idp);

    // Same kid, different key material
    let impostor = TestKeypair::new(2, &idp.keypair.kid);
    let token = TestTokenBuilder::new()
        .for_subject("u-alice")
        .sign_with(&impostor);
    assert!(is_invalid_token(&verifier.verify(&token).await));
}

#[tokio::test]
async fn test_unknown_kid_rejected() {
    let idp = MockIdentityProvider::start().await;
    let verifier = verifier_for(&idp);

    let stranger = TestKeypair::new(1, "unknown-kid");
    let token = TestTokenBuilder::new().sign_with(&stranger);
    assert!(is_invalid_token(&verifier.verify(&token).await));
}

#[tokio::test]
async fn test_future_iat_rejected() {
    let idp = MockIdentityProvider::start().await;
    let verifier = verifier_for(&idp);

    let token = TestTokenBuilder::new()
        .for_subject("u-alice")
        .issued_at(Utc::now().timestamp() + 3600)
        .expires_in(7200)
        .sign_with(&idp.keypair);
    assert!(is_invalid_token(&verifier.verify(&token).await));
}

#[tokio::test]
async fn test_empty_subject_rejected() {
    let idp = MockIdentityProvider::start().await;
    let verifier = verifier_for(&idp);

    let token = TestTokenBuilder::new()
        .for_subject("")
        .sign_with(&idp.keypair);
    assert!(is_invalid_token(&verifier.verify(&token).await));
}

#[tokio::test]
async fn test_issuer_and_audience_are_enforced_when_configured() {
    let idp = MockIdentityProvider::start().await;
    let verifier = verifier_for(&idp)
        .with_issuer(Some("https://id.example.com".to_string()))
        .with_audience(Some("huddle".to_string()));

    let good = TestTokenBuilder::new()
        .for_subject("u-alice")
        .with_issuer("https://id.example.com")
        .with_audience("huddle")
        .sign_with(&idp.keypair);
    assert_eq!(verifier.verify(&good).await.unwrap().subject, "u-alice");

    let wrong_issuer = TestTokenBuilder::new()
        .with_issuer("https://evil.example.com")
        .with_audience("huddle")
        .sign_with(&idp.keypair);
    assert!(is_invalid_token(&verifier.verify(&wrong_issuer).await));

    let wrong_audience = TestTokenBuilder::new()
        .with_issuer("https://id.example.com")
        .with_audience("someone-else")
        .sign_with(&idp.keypair);
    assert!(is_invalid_token(&verifier.verify(&wrong_audience).await));
}

#[tokio::test]
async fn test_audience_ignored_when_not_configured() {
    let idp = MockIdentityProvider::start().await;
    let verifier = verifier_for(&idp);

    let token = TestTokenBuilder::new()
        .for_subject("u-alice")
        .with_audience("anything")
        .sign_with(&idp.keypair);
    assert!(verifier.verify(&token).await.is_ok());
}

#[tokio::test]
async fn test_unavailable_provider_is_service_unavailable() {
    let idp = MockIdentityProvider::failing().await;
    let verifier = verifier_for(&idp);

    let result = verifier.verify(&idp.token_for("u-alice")).await;
    assert!(matches!(result, Err(HuddleError::ServiceUnavailable(_))));
}

#[tokio::test]
async fn test_registration_with_real_token() -> Result<(), anyhow::Error> {
    let idp = MockIdentityProvider::start().await;
    let jwks_url = idp.jwks_url();
    let server = TestHuddleServer::spawn_with_verifier(
        &[("IDP_JWKS_URL", jwks_url.as_str())],
        Arc::new(verifier_for(&idp)),
    )
    .await?;
    let token = idp.token_for("u-alice");

    let response = server
        .client()
        .post(format!("{}/api/v1/accounts", server.url()))
        .bearer_auth(&token)
        .json(&json!({ "display_name": "alice" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = server
        .client()
        .get(format!("{}/api/v1/accounts/@me", server.url()))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["id"], "u-alice");

    let expired = TestTokenBuilder::new()
        .for_subject("u-alice")
        .expires_in(-3600)
        .sign_with(&idp.keypair);
    let response = server
        .client()
        .get(format!("{}/api/v1/accounts/@me", server.url()))
        .bearer_auth(&expired)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_provider_outage_surfaces_as_503() -> Result<(), anyhow::Error> {
    let idp = MockIdentityProvider::failing().await;
    let server =
        TestHuddleServer::spawn_with_verifier(&[], Arc::new(verifier_for(&idp))).await?;

    let response = server
        .client()
        .get(format!("{}/api/v1/accounts/@me", server.url()))
        .bearer_auth(idp.token_for("u-alice"))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    Ok(())
}
