//! Huddle service configuration.
//!
//! Configuration is loaded from environment variables. The database URL
//! is redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default bind address for the HTTP server.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default JWKS endpoint of the identity provider.
pub const DEFAULT_IDP_JWKS_URL: &str = "http://localhost:8082/.well-known/jwks.json";

/// Deadline for single-entity operations, in seconds.
pub const DEFAULT_OPERATION_TIMEOUT_SECONDS: u64 = 10;

/// Deadline for cascades and meeting creation fan-out, in seconds.
pub const DEFAULT_CASCADE_TIMEOUT_SECONDS: u64 = 20;

/// Concurrent meetings a new account may own or join.
pub const DEFAULT_MEETING_QUOTA: i32 = 5;

/// Outstanding invitations a new meeting may have.
pub const DEFAULT_INVITE_QUOTA: i32 = 10;

/// Huddle service configuration.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Identity provider JWKS endpoint used to verify bearer tokens.
    pub idp_jwks_url: String,

    /// Expected `iss` claim. Not checked when unset.
    pub idp_issuer: Option<String>,

    /// Expected `aud` claim. Not checked when unset.
    pub idp_audience: Option<String>,

    /// JWT clock skew tolerance in seconds for iat validation.
    pub jwt_clock_skew_seconds: u64,

    /// Deadline applied to single-entity operations.
    pub operation_timeout_seconds: u64,

    /// Deadline applied to cascading deletes and meeting creation.
    pub cascade_timeout_seconds: u64,

    /// Meeting quota assigned to newly created accounts.
    pub default_meeting_quota: i32,

    /// Invitation quota assigned to newly created meetings.
    pub default_invite_quota: i32,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field("idp_jwks_url", &self.idp_jwks_url)
            .field("idp_issuer", &self.idp_issuer)
            .field("idp_audience", &self.idp_audience)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("operation_timeout_seconds", &self.operation_timeout_seconds)
            .field("cascade_timeout_seconds", &self.cascade_timeout_seconds)
            .field("default_meeting_quota", &self.default_meeting_quota)
            .field("default_invite_quota", &self.default_invite_quota)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid timeout configuration: {0}")]
    InvalidTimeout(String),

    #[error("Invalid quota configuration: {0}")]
    InvalidQuota(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let idp_jwks_url = vars
            .get("IDP_JWKS_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_IDP_JWKS_URL.to_string());

        let idp_issuer = vars.get("IDP_ISSUER").filter(|v| !v.is_empty()).cloned();
        let idp_audience = vars.get("IDP_AUDIENCE").filter(|v| !v.is_empty()).cloned();

        let jwt_clock_skew_seconds = match vars.get("JWT_CLOCK_SKEW_SECONDS") {
            Some(value_str) => {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidJwtClockSkew(format!(
                        "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidJwtClockSkew(
                        "JWT_CLOCK_SKEW_SECONDS must be positive".to_string(),
                    ));
                }

                if value > MAX_CLOCK_SKEW.as_secs() {
                    return Err(ConfigError::InvalidJwtClockSkew(format!(
                        "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                        MAX_CLOCK_SKEW.as_secs(),
                        value
                    )));
                }

                value
            }
            None => DEFAULT_CLOCK_SKEW.as_secs(),
        };

        let operation_timeout_seconds = parse_timeout(
            vars,
            "OPERATION_TIMEOUT_SECONDS",
            DEFAULT_OPERATION_TIMEOUT_SECONDS,
        )?;
        let cascade_timeout_seconds = parse_timeout(
            vars,
            "CASCADE_TIMEOUT_SECONDS",
            DEFAULT_CASCADE_TIMEOUT_SECONDS,
        )?;

        let default_meeting_quota =
            parse_quota(vars, "DEFAULT_MEETING_QUOTA", DEFAULT_MEETING_QUOTA)?;
        let default_invite_quota = parse_quota(vars, "DEFAULT_INVITE_QUOTA", DEFAULT_INVITE_QUOTA)?;

        Ok(Config {
            database_url,
            bind_address,
            idp_jwks_url,
            idp_issuer,
            idp_audience,
            jwt_clock_skew_seconds,
            operation_timeout_seconds,
            cascade_timeout_seconds,
            default_meeting_quota,
            default_invite_quota,
        })
    }

    /// Clock skew tolerance as a `Duration`.
    pub fn jwt_clock_skew(&self) -> Duration {
        Duration::from_secs(self.jwt_clock_skew_seconds)
    }

    /// Deadline for single-entity operations.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_seconds)
    }

    /// Deadline for cascades and meeting creation.
    pub fn cascade_timeout(&self) -> Duration {
        Duration::from_secs(self.cascade_timeout_seconds)
    }
}

fn parse_timeout(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidTimeout(format!(
            "{} must be a valid positive integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidTimeout(format!(
            "{} must be greater than 0",
            name
        )));
    }

    Ok(value)
}

fn parse_quota(
    vars: &HashMap<String, String>,
    name: &str,
    default: i32,
) -> Result<i32, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: i32 = value_str.parse().map_err(|e| {
        ConfigError::InvalidQuota(format!(
            "{} must be a valid integer, got '{}': {}",
            name, value_str, e
        ))
    })?;

    if value < 0 {
        return Err(ConfigError::InvalidQuota(format!(
            "{} must not be negative, got {}",
            name, value
        )));
    }

    Ok(value)
}
