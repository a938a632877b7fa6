//! Huddle Service Library
//!
//! Accounts, meetings with owner/organizer/participant roles, and the
//! invitations that move accounts into meetings.
//!
//! # Architecture
//!
//! Handler -> Service -> Repository:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! Services hold their store ports as `Arc<dyn ...Store>` and never touch
//! the HTTP layer. Membership and quota decisions are pure functions in
//! `models` and `services::quota`.
//!
//! # Modules
//!
//! - `auth` - Bearer token verification against the identity provider JWKS
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics middleware
//! - `models` - Entities, membership model and API payloads
//! - `observability` - Prometheus metrics
//! - `repositories` - Store ports with Postgres and in-memory implementations
//! - `routes` - Axum router setup
//! - `services` - Invitation state machine, meeting and account lifecycle

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
