//! Signed test tokens and a mocked identity provider.
//!
//! Keys are derived from a one-byte seed so every run signs with the same
//! key material.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mocked provider serves its key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Deterministic Ed25519 keypair.
pub struct TestKeypair {
    pub kid: String,
    public_key_bytes: Vec<u8>,
    private_key_pkcs8: Vec<u8>,
}

impl TestKeypair {
    pub fn new(seed: u8, kid: &str) -> Self {
        let mut seed_bytes = [0u8; 32];
        seed_bytes[0] = seed;
        for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
            *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
        }

        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
            .expect("Failed to create test keypair");

        Self {
            kid: kid.to_string(),
            public_key_bytes: key_pair.public_key().as_ref().to_vec(),
            private_key_pkcs8: build_pkcs8_from_seed(&seed_bytes),
        }
    }

    /// Sign arbitrary claims with this key, `kid` set in the header.
    pub fn sign(&self, claims: &serde_json::Value) -> String {
        let encoding_key = EncodingKey::from_ed_der(&self.private_key_pkcs8);
        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());

        encode(&header, claims, &encoding_key).expect("Failed to sign token")
    }

    /// Public half as a JWK.
    pub fn jwk_json(&self) -> serde_json::Value {
        json!({
            "kty": "OKP",
            "kid": self.kid,
            "crv": "Ed25519",
            "x": URL_SAFE_NO_PAD.encode(&self.public_key_bytes),
            "alg": "EdDSA",
            "use": "sig"
        })
    }
}

/// Build a PKCS#8 v1 document from an Ed25519 seed.
pub fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    let mut pkcs8 = Vec::with_capacity(48);

    // SEQUENCE, 46 bytes
    pkcs8.extend_from_slice(&[0x30, 0x2e]);
    // version INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);
    // AlgorithmIdentifier SEQUENCE { OID 1.3.101.112 }
    pkcs8.extend_from_slice(&[0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70]);
    // privateKey OCTET STRING { OCTET STRING seed }
    pkcs8.extend_from_slice(&[0x04, 0x22, 0x04, 0x20]);
    pkcs8.extend_from_slice(seed);

    pkcs8
}

/// Builder for identity token claims.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_subject("u-alice")
///     .expires_in(3600)
///     .sign_with(&keypair);
/// ```
pub struct TestTokenBuilder {
    sub: String,
    exp: i64,
    iat: i64,
    iss: Option<String>,
    aud: Option<String>,
}

impl TestTokenBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            iss: None,
            aud: None,
        }
    }

    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Expiration in seconds from now (negative for an expired token).
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = Some(issuer.to_string());
        self
    }

    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = Some(audience.to_string());
        self
    }

    pub fn build(self) -> serde_json::Value {
        let mut claims = json!({
            "sub": self.sub,
            "exp": self.exp,
            "iat": self.iat,
        });
        if let Some(iss) = self.iss {
            claims["iss"] = json!(iss);
        }
        if let Some(aud) = self.aud {
            claims["aud"] = json!(aud);
        }
        claims
    }

    pub fn sign_with(self, keypair: &TestKeypair) -> String {
        keypair.sign(&self.build())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity provider double serving one keypair's JWKS.
pub struct MockIdentityProvider {
    pub server: MockServer,
    pub keypair: TestKeypair,
}

impl MockIdentityProvider {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let keypair = TestKeypair::new(1, "idp-test-key-01");

        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "keys": [keypair.jwk_json()] })),
            )
            .mount(&server)
            .await;

        Self { server, keypair }
    }

    /// Provider whose JWKS endpoint always fails.
    pub async fn failing() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        Self {
            server,
            keypair: TestKeypair::new(1, "idp-test-key-01"),
        }
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Valid token for `subject`.
    pub fn token_for(&self, subject: &str) -> String {
        TestTokenBuilder::new()
            .for_subject(subject)
            .sign_with(&self.keypair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creates_claims() {
        let claims = TestTokenBuilder::new()
            .for_subject("u-alice")
            .with_issuer("https://id.example.com")
            .build();

        assert_eq!(claims["sub"], "u-alice");
        assert_eq!(claims["iss"], "https://id.example.com");
        assert!(claims.get("aud").is_none());
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn test_pkcs8_layout() {
        let seed = [7u8; 32];
        let pkcs8 = build_pkcs8_from_seed(&seed);
        assert_eq!(pkcs8.len(), 48);
        assert_eq!(&pkcs8[..2], &[0x30, 0x2e]);
        assert_eq!(&pkcs8[16..], &seed);
    }

    #[test]
    fn test_keypair_is_deterministic() {
        let a = TestKeypair::new(3, "k");
        let b = TestKeypair::new(3, "k");
        assert_eq!(a.jwk_json(), b.jwk_json());
        assert_ne!(a.jwk_json(), TestKeypair::new(4, "k").jwk_json());
    }

    #[test]
    fn test_signed_token_carries_kid() {
        let keypair = TestKeypair::new(1, "idp-test-key-01");
        let token = TestTokenBuilder::new().sign_with(&keypair);
        assert_eq!(
            common::jwt::extract_kid(&token).unwrap(),
            "idp-test-key-01"
        );
    }
}
