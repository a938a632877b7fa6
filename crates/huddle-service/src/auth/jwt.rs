//! Bearer token verification.
//!
//! - Tokens are size-checked before parsing
//! - Only EdDSA (Ed25519) signatures are accepted
//! - `exp` is required; `iat` may not be in the future beyond the clock skew
//! - Issuer and audience are checked when configured
//!
//! Every rejection carries the same client-facing message.

use super::claims::IdentityClaims;
use super::jwks::{Jwk, JwksClient};
use super::{IdentityVerifier, VerifiedIdentity};
use crate::errors::HuddleError;
use common::jwt::{decode_ed25519_public_key_jwk, extract_kid, validate_iat};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

const INVALID_TOKEN: &str = "The access token is invalid or expired";

/// Verifies tokens against the identity provider's published keys.
pub struct JwtIdentityVerifier {
    jwks_client: Arc<JwksClient>,
    clock_skew: Duration,
    issuer: Option<String>,
    audience: Option<String>,
}

impl JwtIdentityVerifier {
    pub fn new(jwks_client: Arc<JwksClient>, clock_skew: Duration) -> Self {
        Self {
            jwks_client,
            clock_skew,
            issuer: None,
            audience: None,
        }
    }

    /// Require `iss` to equal `issuer`.
    #[must_use]
    pub fn with_issuer(mut self, issuer: Option<String>) -> Self {
        self.issuer = issuer;
        self
    }

    /// Require `aud` to equal `audience`.
    #[must_use]
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn jwks_client(&self) -> &Arc<JwksClient> {
        &self.jwks_client
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    ///
    /// `InvalidToken` for any verification failure, `ServiceUnavailable`
    /// when the key set cannot be fetched.
    #[instrument(skip_all, name = "huddle.auth.verify")]
    pub async fn verify_claims(&self, token: &str) -> Result<IdentityClaims, HuddleError> {
        let kid = extract_kid(token).map_err(|e| {
            tracing::debug!(target: "huddle.auth.jwt", error = ?e, "Token kid extraction failed");
            invalid()
        })?;

        let jwk = self.jwks_client.get_key(&kid).await?;
        let claims = self.verify_signature(token, &jwk)?;

        if let Err(e) = validate_iat(claims.iat, self.clock_skew) {
            tracing::debug!(target: "huddle.auth.jwt", error = ?e, "Token iat validation failed");
            return Err(invalid());
        }

        if claims.sub.trim().is_empty() {
            tracing::debug!(target: "huddle.auth.jwt", "Token has empty subject");
            return Err(invalid());
        }

        tracing::debug!(target: "huddle.auth.jwt", "Token validated successfully");
        Ok(claims)
    }

    fn verify_signature(&self, token: &str, jwk: &Jwk) -> Result<IdentityClaims, HuddleError> {
        if jwk.kty != "OKP" {
            tracing::warn!(target: "huddle.auth.jwt", kty = %jwk.kty, "Unexpected JWK key type");
            return Err(invalid());
        }
        if let Some(alg) = &jwk.alg {
            if alg != "EdDSA" {
                tracing::warn!(target: "huddle.auth.jwt", alg = %alg, "Unexpected JWK algorithm");
                return Err(invalid());
            }
        }

        let x = jwk.x.as_ref().ok_or_else(|| {
            tracing::error!(target: "huddle.auth.jwt", kid = %jwk.kid, "JWK missing x field");
            invalid()
        })?;
        let public_key = decode_ed25519_public_key_jwk(x).map_err(|e| {
            tracing::error!(target: "huddle.auth.jwt", error = %e, "Invalid public key encoding");
            invalid()
        })?;
        let decoding_key = DecodingKey::from_ed_der(&public_key);

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.validate_exp = true;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        decode::<IdentityClaims>(token, &decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(target: "huddle.auth.jwt", error = %e, "Token verification failed");
                invalid()
            })
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for JwtIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, HuddleError> {
        let claims = self.verify_claims(token).await?;
        Ok(VerifiedIdentity {
            subject: claims.sub,
        })
    }
}

fn invalid() -> HuddleError {
    HuddleError::InvalidToken(INVALID_TOKEN.to_string())
}
