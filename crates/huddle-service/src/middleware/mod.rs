//! Middleware for Huddle.
//!
//! # Components
//!
//! - `auth` - Bearer token verification and account resolution
//! - `http_metrics` - HTTP request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_account, require_identity, AuthState, Caller};
pub use http_metrics::http_metrics_middleware;
