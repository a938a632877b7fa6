//! Caller identity.
//!
//! Every request carries a bearer token issued by an external identity
//! provider. The verified token subject is the caller's account id.
//!
//! # Components
//!
//! - `claims` - Token claims
//! - `jwks` - Cached identity provider key set
//! - `jwt` - EdDSA token verification

pub mod claims;
pub mod jwks;
pub mod jwt;

pub use claims::IdentityClaims;
pub use jwks::JwksClient;
pub use jwt::JwtIdentityVerifier;

use crate::errors::HuddleError;

/// Identity established from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Token subject; doubles as the account id.
    pub subject: String,
}

/// Turns a bearer token into an identity.
///
/// Implementations return `HuddleError::InvalidToken` for any token they do
/// not accept and `HuddleError::ServiceUnavailable` when the provider
/// cannot be reached.
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, HuddleError>;
}
