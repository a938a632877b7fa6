//! HTTP request handlers for Huddle.
//!
//! Request bodies are parsed by hand so malformed JSON yields 400 with the
//! standard error body instead of Axum's default 422.

pub mod accounts;
pub mod health;
pub mod invites;
pub mod meetings;
pub mod metrics;

pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;

use crate::errors::HuddleError;
use serde::de::DeserializeOwned;

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, HuddleError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "huddle.handlers", error = %e, "Invalid request body");
        HuddleError::BadRequest("Invalid request body".to_string())
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::SendInviteRequest;

    #[test]
    fn test_parse_body() {
        let request: SendInviteRequest =
            parse_body(br#"{"meeting_id":"m1","receiver_id":"u2"}"#).unwrap();
        assert_eq!(request.meeting_id, "m1");

        let result: Result<SendInviteRequest, _> = parse_body(b"{\"meeting_id\":");
        assert!(matches!(result, Err(HuddleError::BadRequest(_))));
    }
}
