//! Invitations repository for database operations.
//!
//! The `uq_invites_receiver_meeting` constraint closes the race between
//! two concurrent sends for the same receiver and meeting. The loser gets
//! `HuddleError::Conflict`.

use super::{count_to_u64, observe_query, InvitationStore};
use crate::errors::HuddleError;
use crate::models::Invitation;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

const INVITE_CONFLICT: &str = "An invitation for this account and meeting already exists";

/// Postgres-backed `InvitationStore`.
pub struct InvitationsRepository {
    pool: PgPool,
}

impl InvitationsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_many(
        &self,
        operation: &'static str,
        sql: &'static str,
        key: &str,
    ) -> Result<Vec<Invitation>, HuddleError> {
        let start = Instant::now();
        let result = sqlx::query(sql).bind(key).fetch_all(&self.pool).await;
        let rows = observe_query(operation, start, result, INVITE_CONFLICT)?;
        Ok(rows.into_iter().map(map_row_to_invitation).collect())
    }

    async fn count(
        &self,
        operation: &'static str,
        sql: &'static str,
        key: &str,
    ) -> Result<u64, HuddleError> {
        let start = Instant::now();
        let result = sqlx::query(sql).bind(key).fetch_one(&self.pool).await;
        let row = observe_query(operation, start, result, INVITE_CONFLICT)?;
        Ok(count_to_u64(row.get("count")))
    }
}

#[async_trait::async_trait]
impl InvitationStore for InvitationsRepository {
    #[instrument(skip_all, name = "huddle.repo.create_invite")]
    async fn create(&self, invitation: &Invitation) -> Result<(), HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            INSERT INTO invites (invite_id, sender_id, receiver_id, meeting_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&invitation.id)
        .bind(&invitation.sender_id)
        .bind(&invitation.receiver_id)
        .bind(&invitation.meeting_id)
        .bind(invitation.timestamp)
        .execute(&self.pool)
        .await;

        observe_query("create_invite", start, result, INVITE_CONFLICT)?;
        Ok(())
    }

    #[instrument(skip_all, name = "huddle.repo.get_invite")]
    async fn get(&self, invite_id: &str) -> Result<Option<Invitation>, HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            SELECT invite_id, sender_id, receiver_id, meeting_id, created_at
            FROM invites
            WHERE invite_id = $1
            "#,
        )
        .bind(invite_id)
        .fetch_optional(&self.pool)
        .await;

        let row = observe_query("get_invite", start, result, INVITE_CONFLICT)?;
        Ok(row.map(map_row_to_invitation))
    }

    #[instrument(skip_all, name = "huddle.repo.get_invite_by_receiver_and_meeting")]
    async fn get_by_receiver_and_meeting(
        &self,
        receiver_id: &str,
        meeting_id: &str,
    ) -> Result<Option<Invitation>, HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            SELECT invite_id, sender_id, receiver_id, meeting_id, created_at
            FROM invites
            WHERE receiver_id = $1 AND meeting_id = $2
            "#,
        )
        .bind(receiver_id)
        .bind(meeting_id)
        .fetch_optional(&self.pool)
        .await;

        let row = observe_query(
            "get_invite_by_receiver_and_meeting",
            start,
            result,
            INVITE_CONFLICT,
        )?;
        Ok(row.map(map_row_to_invitation))
    }

    #[instrument(skip_all, name = "huddle.repo.list_invites_by_receiver")]
    async fn list_by_receiver(&self, receiver_id: &str) -> Result<Vec<Invitation>, HuddleError> {
        self.fetch_many(
            "list_invites_by_receiver",
            r#"
            SELECT invite_id, sender_id, receiver_id, meeting_id, created_at
            FROM invites
            WHERE receiver_id = $1
            ORDER BY created_at, invite_id
            "#,
            receiver_id,
        )
        .await
    }

    #[instrument(skip_all, name = "huddle.repo.count_invites_by_receiver")]
    async fn count_by_receiver(&self, receiver_id: &str) -> Result<u64, HuddleError> {
        self.count(
            "count_invites_by_receiver",
            "SELECT COUNT(*) AS count FROM invites WHERE receiver_id = $1",
            receiver_id,
        )
        .await
    }

    #[instrument(skip_all, name = "huddle.repo.list_invites_by_meeting")]
    async fn list_by_meeting(&self, meeting_id: &str) -> Result<Vec<Invitation>, HuddleError> {
        self.fetch_many(
            "list_invites_by_meeting",
            r#"
            SELECT invite_id, sender_id, receiver_id, meeting_id, created_at
            FROM invites
            WHERE meeting_id = $1
            ORDER BY created_at, invite_id
            "#,
            meeting_id,
        )
        .await
    }

    #[instrument(skip_all, name = "huddle.repo.count_invites_by_meeting")]
    async fn count_by_meeting(&self, meeting_id: &str) -> Result<u64, HuddleError> {
        self.count(
            "count_invites_by_meeting",
            "SELECT COUNT(*) AS count FROM invites WHERE meeting_id = $1",
            meeting_id,
        )
        .await
    }

    #[instrument(skip_all, name = "huddle.repo.delete_invite")]
    async fn delete(&self, invite_id: &str) -> Result<bool, HuddleError> {
        let start = Instant::now();

        let result = sqlx::query("DELETE FROM invites WHERE invite_id = $1")
            .bind(invite_id)
            .execute(&self.pool)
            .await;

        let done = observe_query("delete_invite", start, result, INVITE_CONFLICT)?;
        Ok(done.rows_affected() > 0)
    }
}

fn map_row_to_invitation(row: PgRow) -> Invitation {
    Invitation {
        id: row.get("invite_id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        meeting_id: row.get("meeting_id"),
        timestamp: row.get("created_at"),
    }
}
