//! # Huddle Test Utilities
//!
//! Shared test utilities for the Huddle service.
//!
//! This crate provides:
//! - A service-level fixture over in-memory stores (`TestWorld`)
//! - A static token verifier (`StaticIdentityVerifier`)
//! - Signed test tokens and a mocked JWKS endpoint (`TestKeypair`,
//!   `TestTokenBuilder`, `MockIdentityProvider`)
//! - A real HTTP server on a random port (`TestHuddleServer`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use huddle_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestHuddleServer::spawn().await?;
//!     let alice = server.register("u-alice", "alice").await?;
//!
//!     let response = server
//!         .client()
//!         .get(format!("{}/api/v1/accounts/@me", server.url()))
//!         .bearer_auth(&alice)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod identity;
pub mod server_harness;
pub mod token_builders;

pub use fixtures::*;
pub use identity::*;
pub use server_harness::*;
pub use token_builders::*;
