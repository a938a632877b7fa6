//! Token verifier with a fixed token table.

use async_trait::async_trait;
use huddle_service::auth::{IdentityVerifier, VerifiedIdentity};
use huddle_service::errors::HuddleError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Accepts exactly the tokens it has issued.
///
/// Tokens are opaque strings of the form `test-token-<subject>`.
#[derive(Default)]
pub struct StaticIdentityVerifier {
    tokens: Mutex<HashMap<String, String>>,
}

impl StaticIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token that verifies as `subject`.
    pub fn issue(&self, subject: &str) -> String {
        let token = format!("test-token-{subject}");
        self.tokens
            .lock()
            .unwrap()
            .insert(token.clone(), subject.to_string());
        token
    }

    /// Make a previously issued token invalid.
    pub fn revoke(&self, token: &str) {
        self.tokens.lock().unwrap().remove(token);
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, HuddleError> {
        let subject = self.tokens.lock().unwrap().get(token).cloned();
        subject
            .map(|subject| VerifiedIdentity { subject })
            .ok_or_else(|| {
                HuddleError::InvalidToken("The access token is invalid or expired".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issue_and_revoke() {
        let verifier = StaticIdentityVerifier::new();
        let token = verifier.issue("u-1");

        assert_eq!(verifier.verify(&token).await.unwrap().subject, "u-1");

        verifier.revoke(&token);
        assert!(matches!(
            verifier.verify(&token).await,
            Err(HuddleError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let verifier = StaticIdentityVerifier::new();
        assert!(verifier.verify("made-up").await.is_err());
    }
}
