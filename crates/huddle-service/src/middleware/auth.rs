//! Authentication middleware for protected routes.
//!
//! `require_identity` verifies the bearer token and stores the caller in
//! request extensions. `require_account` additionally requires the caller
//! to have registered an account; it guards every route except account
//! registration.

use crate::auth::IdentityVerifier;
use crate::errors::HuddleError;
use crate::repositories::AccountStore;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<dyn IdentityVerifier>,
    pub accounts: Arc<dyn AccountStore>,
}

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub account_id: String,
}

/// Pull the token out of an `Authorization: Bearer <token>` header.
fn extract_bearer_token(req: &Request) -> Result<&str, HuddleError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "huddle.middleware.auth", "Missing Authorization header");
            HuddleError::InvalidToken("Missing Authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "huddle.middleware.auth", "Invalid Authorization header format");
        HuddleError::InvalidToken("Invalid Authorization header format".to_string())
    })?;

    if token.is_empty() {
        return Err(HuddleError::InvalidToken(
            "Invalid Authorization header format".to_string(),
        ));
    }

    Ok(token)
}

async fn authenticate(state: &AuthState, token: &str) -> Result<Caller, HuddleError> {
    let identity = state.verifier.verify(token).await?;
    Ok(Caller {
        account_id: identity.subject,
    })
}

/// Verify the token only. Used by account registration.
#[instrument(skip_all, name = "huddle.middleware.identity")]
pub async fn require_identity(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HuddleError> {
    let token = extract_bearer_token(&req)?;
    let caller = authenticate(&state, token).await?;
    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

/// Verify the token and require a registered account.
///
/// Returns 404 when the token is valid but no account exists for it.
#[instrument(skip_all, name = "huddle.middleware.account")]
pub async fn require_account(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HuddleError> {
    let token = extract_bearer_token(&req)?;
    let caller = authenticate(&state, token).await?;

    if state.accounts.get(&caller.account_id).await?.is_none() {
        tracing::debug!(target: "huddle.middleware.auth", "Caller has no account");
        return Err(HuddleError::NotFound(
            "No account registered for this identity".to_string(),
        ));
    }

    req.extensions_mut().insert(caller);
    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(header: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/v1/accounts/@me");
        if let Some(value) = header {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(
            extract_bearer_token(&request(Some("Bearer abc.def.ghi"))).unwrap(),
            "abc.def.ghi"
        );
    }

    #[test]
    fn test_extract_bearer_token_rejects_bad_headers() {
        for header in [None, Some("Basic dXNlcjpwYXNz"), Some("Bearer "), Some("bearer abc")] {
            assert!(matches!(
                extract_bearer_token(&request(header)),
                Err(HuddleError::InvalidToken(_))
            ));
        }
    }
}
