//! Account handlers.
//!
//! - `POST /api/v1/accounts` - Register the caller (token only)
//! - `GET/PATCH/DELETE /api/v1/accounts/@me` - Own account
//! - `GET /api/v1/accounts/@me/meetings[/count]` - Own meetings
//! - `GET /api/v1/accounts/@me/invites[/count]` - Invitations addressed to the caller

use super::parse_body;
use crate::errors::HuddleError;
use crate::middleware::Caller;
use crate::models::{Account, AccountDeletion, CountResponse, DisplayNameRequest, Invitation, Meeting};
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/accounts
///
/// - 201 Created: account registered under the token subject
/// - 400 Bad Request: body unreadable or display name out of bounds
/// - 409 Conflict: already registered, or display name taken
#[instrument(skip_all, name = "huddle.accounts.register")]
pub async fn register_account(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<Account>), HuddleError> {
    let request: DisplayNameRequest = parse_body(&body)?;
    let account = state
        .services
        .accounts
        .create(&caller.account_id, &request.display_name)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Handler for GET /api/v1/accounts/@me
#[instrument(skip_all, name = "huddle.accounts.get")]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Account>, HuddleError> {
    let account = state
        .services
        .accounts
        .get(&caller.account_id, &caller.account_id)
        .await?;
    Ok(Json(account))
}

/// Handler for PATCH /api/v1/accounts/@me
#[instrument(skip_all, name = "huddle.accounts.update")]
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: axum::body::Bytes,
) -> Result<Json<Account>, HuddleError> {
    let request: DisplayNameRequest = parse_body(&body)?;
    let account = state
        .services
        .accounts
        .update_display_name(&caller.account_id, &request.display_name)
        .await?;
    Ok(Json(account))
}

/// Handler for DELETE /api/v1/accounts/@me
///
/// - 200 OK: per-item cascade report
/// - 409 Conflict (`OWNER_CONFLICT`): the account still owns meetings
#[instrument(skip_all, name = "huddle.accounts.delete")]
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<AccountDeletion>, HuddleError> {
    let report = state
        .services
        .accounts
        .delete(&caller.account_id, &caller.account_id)
        .await?;
    Ok(Json(report))
}

/// Handler for GET /api/v1/accounts/@me/meetings
#[instrument(skip_all, name = "huddle.accounts.meetings")]
pub async fn list_my_meetings(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Meeting>>, HuddleError> {
    let meetings = state
        .services
        .meetings
        .list_for_account(&caller.account_id)
        .await?;
    Ok(Json(meetings))
}

/// Handler for GET /api/v1/accounts/@me/meetings/count
#[instrument(skip_all, name = "huddle.accounts.meetings_count")]
pub async fn count_my_meetings(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<CountResponse>, HuddleError> {
    let count = state
        .services
        .meetings
        .count_for_account(&caller.account_id)
        .await?;
    Ok(Json(CountResponse { count }))
}

/// Handler for GET /api/v1/accounts/@me/invites
#[instrument(skip_all, name = "huddle.accounts.invites")]
pub async fn list_my_invites(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<Vec<Invitation>>, HuddleError> {
    let invites = state
        .services
        .invitations
        .list_for_receiver(&caller.account_id)
        .await?;
    Ok(Json(invites))
}

/// Handler for GET /api/v1/accounts/@me/invites/count
#[instrument(skip_all, name = "huddle.accounts.invites_count")]
pub async fn count_my_invites(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<CountResponse>, HuddleError> {
    let count = state
        .services
        .invitations
        .count_for_receiver(&caller.account_id)
        .await?;
    Ok(Json(CountResponse { count }))
}
