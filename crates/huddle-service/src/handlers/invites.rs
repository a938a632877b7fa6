//! Invitation handlers.
//!
//! - `POST /api/v1/invites` - Send (organizers)
//! - `GET /api/v1/invites/:id` - Read (receiver, sender, members)
//! - `DELETE /api/v1/invites/:id` - Reject or withdraw
//! - `POST /api/v1/invites/:id/accept` - Accept (receiver)
//!
//! Accept and delete answer 200 with an `outcome` field; a stale invitation
//! is removed and reported as `{"outcome":"stale","reason":...}`.

use super::parse_body;
use crate::errors::HuddleError;
use crate::middleware::Caller;
use crate::models::{AcceptOutcome, DeleteInviteOutcome, Invitation, SendInviteRequest};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/invites
///
/// - 201 Created
/// - 403 Forbidden: caller is not an organizer of the meeting
/// - 404 Not Found: meeting or receiver absent
/// - 409 Conflict: receiver already a member or already invited;
///   `QUOTA_EXCEEDED` when the meeting's invite quota is used up
#[instrument(skip_all, name = "huddle.invites.send")]
pub async fn send_invite(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<Invitation>), HuddleError> {
    let request: SendInviteRequest = parse_body(&body)?;
    let invitation = state
        .services
        .invitations
        .send(&request.meeting_id, &request.receiver_id, &caller.account_id)
        .await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

/// Handler for GET /api/v1/invites/:id
#[instrument(skip_all, name = "huddle.invites.get")]
pub async fn get_invite(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(invite_id): Path<String>,
) -> Result<Json<Invitation>, HuddleError> {
    let invitation = state
        .services
        .invitations
        .get(&invite_id, &caller.account_id)
        .await?;
    Ok(Json(invitation))
}

/// Handler for DELETE /api/v1/invites/:id
#[instrument(skip_all, name = "huddle.invites.delete")]
pub async fn delete_invite(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(invite_id): Path<String>,
) -> Result<Json<DeleteInviteOutcome>, HuddleError> {
    let outcome = state
        .services
        .invitations
        .delete(&invite_id, &caller.account_id)
        .await?;
    Ok(Json(outcome))
}

/// Handler for POST /api/v1/invites/:id/accept
#[instrument(skip_all, name = "huddle.invites.accept")]
pub async fn accept_invite(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(invite_id): Path<String>,
) -> Result<Json<AcceptOutcome>, HuddleError> {
    let outcome = state
        .services
        .invitations
        .accept(&invite_id, &caller.account_id)
        .await?;
    Ok(Json(outcome))
}
