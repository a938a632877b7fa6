//! Huddle error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl.
//! Store and availability failures return a generic message to clients;
//! the underlying cause is logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Huddle error type.
///
/// Maps to HTTP status codes:
/// - Database, Internal: 500 Internal Server Error
/// - InvalidToken: 401 Unauthorized
/// - Forbidden: 403 Forbidden
/// - NotFound: 404 Not Found
/// - Conflict, QuotaExceeded, OwnerConflict: 409 Conflict
/// - BadRequest: 400 Bad Request
/// - ServiceUnavailable: 503 Service Unavailable
/// - Timeout: 504 Gateway Timeout
#[derive(Debug, Error)]
pub enum HuddleError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Duplicate invitation, display name, account or membership.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Meeting or invitation limit reached.
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Account deletion blocked because the account still owns meetings.
    #[error("Owner conflict: {0}")]
    OwnerConflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An operation did not finish within its deadline.
    #[error("Deadline exceeded: {0}")]
    Timeout(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl HuddleError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            HuddleError::Database(_) | HuddleError::Internal => 500,
            HuddleError::InvalidToken(_) => 401,
            HuddleError::NotFound(_) => 404,
            HuddleError::Forbidden(_) => 403,
            HuddleError::Conflict(_)
            | HuddleError::QuotaExceeded(_)
            | HuddleError::OwnerConflict(_) => 409,
            HuddleError::BadRequest(_) => 400,
            HuddleError::Timeout(_) => 504,
            HuddleError::ServiceUnavailable(_) => 503,
        }
    }

    /// Bounded label for metrics and cascade failure reports.
    pub fn error_type(&self) -> &'static str {
        match self {
            HuddleError::Database(_) => "database",
            HuddleError::InvalidToken(_) => "invalid_token",
            HuddleError::NotFound(_) => "not_found",
            HuddleError::Forbidden(_) => "forbidden",
            HuddleError::Conflict(_) => "conflict",
            HuddleError::QuotaExceeded(_) => "quota_exceeded",
            HuddleError::OwnerConflict(_) => "owner_conflict",
            HuddleError::BadRequest(_) => "bad_request",
            HuddleError::Timeout(_) => "timeout",
            HuddleError::ServiceUnavailable(_) => "service_unavailable",
            HuddleError::Internal => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for HuddleError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            HuddleError::Database(err) => {
                tracing::error!(target: "huddle.database", error = %err, "Database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            HuddleError::InvalidToken(reason) => {
                (StatusCode::UNAUTHORIZED, "INVALID_TOKEN", reason.clone())
            }
            HuddleError::NotFound(resource) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", resource.clone())
            }
            HuddleError::Forbidden(reason) => (StatusCode::FORBIDDEN, "FORBIDDEN", reason.clone()),
            HuddleError::Conflict(reason) => (StatusCode::CONFLICT, "CONFLICT", reason.clone()),
            HuddleError::QuotaExceeded(reason) => {
                (StatusCode::CONFLICT, "QUOTA_EXCEEDED", reason.clone())
            }
            HuddleError::OwnerConflict(reason) => {
                (StatusCode::CONFLICT, "OWNER_CONFLICT", reason.clone())
            }
            HuddleError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", reason.clone())
            }
            HuddleError::Timeout(operation) => {
                tracing::warn!(target: "huddle.deadline", operation = %operation, "Operation deadline exceeded");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "DEADLINE_EXCEEDED",
                    "The operation did not complete in time".to_string(),
                )
            }
            HuddleError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "huddle.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            HuddleError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"huddle-api\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

/// Convert sqlx errors to HuddleError
impl From<sqlx::Error> for HuddleError {
    fn from(err: sqlx::Error) -> Self {
        HuddleError::Database(err.to_string())
    }
}
