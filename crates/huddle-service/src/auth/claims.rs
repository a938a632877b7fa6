//! Identity token claims.
//!
//! The `sub` field is redacted in Debug output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Claims of an identity provider access token.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject (account id) - redacted in Debug output.
    pub sub: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
}

impl fmt::Debug for IdentityClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityClaims")
            .field("sub", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_subject() {
        let claims = IdentityClaims {
            sub: "account-8841".to_string(),
            exp: 1_900_000_000,
            iat: 1_899_999_000,
            iss: Some("https://id.example.com".to_string()),
            aud: None,
        };

        let debug_str = format!("{claims:?}");
        assert!(!debug_str.contains("account-8841"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("id.example.com"));
    }

    #[test]
    fn test_optional_claims_default_to_none() {
        let claims: IdentityClaims =
            serde_json::from_str(r#"{"sub":"a","exp":2,"iat":1}"#).unwrap();
        assert_eq!(claims.iss, None);
        assert_eq!(claims.aud, None);
    }
}
