//! Common utilities shared across Huddle crates.

#![warn(clippy::pedantic)]

/// Identifier generation for meetings and invitations
pub mod ids;

/// Bearer token helpers (size limits, key id extraction, iat checks)
pub mod jwt;
