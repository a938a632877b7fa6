//! Meeting handlers.
//!
//! - `POST /api/v1/meetings` - Create a meeting with initial invitations
//! - `GET/DELETE /api/v1/meetings/:id` - Read (members) / cascade delete (owner)
//! - `GET /api/v1/meetings/:id/invites[/count]` - Pending invitations (members)
//! - `PUT/DELETE /api/v1/meetings/:id/organizers/:account_id` - Role changes (owner)

use super::parse_body;
use crate::errors::HuddleError;
use crate::middleware::Caller;
use crate::models::{CountResponse, CreateMeetingRequest, Invitation, Meeting, MeetingCreation, MeetingDeletion};
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/meetings
///
/// - 201 Created: meeting plus the invitations created and the proposed
///   participants that were skipped
/// - 400 Bad Request: invalid body
/// - 409 Conflict (`QUOTA_EXCEEDED`): caller is at its meeting limit
#[instrument(skip_all, name = "huddle.meetings.create")]
pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<MeetingCreation>), HuddleError> {
    let request: CreateMeetingRequest = parse_body(&body)?;
    request
        .validate()
        .map_err(|e| HuddleError::BadRequest(e.to_string()))?;

    let created = state
        .services
        .meetings
        .create(&request.name, request.participants, &caller.account_id)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// Handler for GET /api/v1/meetings/:id
#[instrument(skip_all, name = "huddle.meetings.get")]
pub async fn get_meeting(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(meeting_id): Path<String>,
) -> Result<Json<Meeting>, HuddleError> {
    let meeting = state
        .services
        .meetings
        .get(&meeting_id, &caller.account_id)
        .await?;
    Ok(Json(meeting))
}

/// Handler for DELETE /api/v1/meetings/:id
///
/// Returns the per-invitation cascade report.
#[instrument(skip_all, name = "huddle.meetings.delete")]
pub async fn delete_meeting(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(meeting_id): Path<String>,
) -> Result<Json<MeetingDeletion>, HuddleError> {
    let report = state
        .services
        .meetings
        .delete(&meeting_id, &caller.account_id)
        .await?;
    Ok(Json(report))
}

/// Handler for GET /api/v1/meetings/:id/invites
#[instrument(skip_all, name = "huddle.meetings.invites")]
pub async fn list_meeting_invites(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(meeting_id): Path<String>,
) -> Result<Json<Vec<Invitation>>, HuddleError> {
    let invites = state
        .services
        .invitations
        .list_for_meeting(&meeting_id, &caller.account_id)
        .await?;
    Ok(Json(invites))
}

/// Handler for GET /api/v1/meetings/:id/invites/count
#[instrument(skip_all, name = "huddle.meetings.invites_count")]
pub async fn count_meeting_invites(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(meeting_id): Path<String>,
) -> Result<Json<CountResponse>, HuddleError> {
    let count = state
        .services
        .invitations
        .count_for_meeting(&meeting_id, &caller.account_id)
        .await?;
    Ok(Json(CountResponse { count }))
}

/// Handler for PUT /api/v1/meetings/:id/organizers/:account_id
#[instrument(skip_all, name = "huddle.meetings.promote")]
pub async fn promote_organizer(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((meeting_id, account_id)): Path<(String, String)>,
) -> Result<Json<Meeting>, HuddleError> {
    let meeting = state
        .services
        .meetings
        .promote_organizer(&meeting_id, &account_id, &caller.account_id)
        .await?;
    Ok(Json(meeting))
}

/// Handler for DELETE /api/v1/meetings/:id/organizers/:account_id
#[instrument(skip_all, name = "huddle.meetings.revoke")]
pub async fn revoke_organizer(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((meeting_id, account_id)): Path<(String, String)>,
) -> Result<Json<Meeting>, HuddleError> {
    let meeting = state
        .services
        .meetings
        .revoke_organizer(&meeting_id, &account_id, &caller.account_id)
        .await?;
    Ok(Json(meeting))
}
