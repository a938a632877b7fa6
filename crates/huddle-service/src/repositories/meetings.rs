//! Meetings repository for database operations.
//!
//! Role sets are `TEXT[]` columns. Membership queries use array containment
//! (`@>`) so the GIN indexes on `organizers` and `participants` apply.
//! Updates are conditional on the `version` column.

use super::{count_to_u64, observe_query, MeetingStore};
use crate::errors::HuddleError;
use crate::models::Meeting;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

const MEETING_CONFLICT: &str = "Meeting already exists";

const LIST_FOR_ACCOUNT_SQL: &str = r#"
    SELECT meeting_id, name, owner_id, organizers, participants,
           invite_quota, created_at, version
    FROM meetings
    WHERE owner_id = $1
       OR organizers @> ARRAY[$1]::TEXT[]
       OR participants @> ARRAY[$1]::TEXT[]
    ORDER BY created_at, meeting_id
"#;

const COUNT_FOR_ACCOUNT_SQL: &str = r#"
    SELECT COUNT(*) AS count
    FROM meetings
    WHERE owner_id = $1
       OR organizers @> ARRAY[$1]::TEXT[]
       OR participants @> ARRAY[$1]::TEXT[]
"#;

/// Postgres-backed `MeetingStore`.
pub struct MeetingsRepository {
    pool: PgPool,
}

impl MeetingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MeetingStore for MeetingsRepository {
    #[instrument(skip_all, name = "huddle.repo.create_meeting")]
    async fn create(&self, meeting: &Meeting) -> Result<(), HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            INSERT INTO meetings (
                meeting_id, name, owner_id, organizers, participants,
                invite_quota, created_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&meeting.id) // $1
        .bind(&meeting.name) // $2
        .bind(&meeting.owner_id) // $3
        .bind(role_vec(&meeting.organizers)) // $4
        .bind(role_vec(&meeting.participants)) // $5
        .bind(meeting.invite_quota) // $6
        .bind(meeting.created_at) // $7
        .bind(meeting.version) // $8
        .execute(&self.pool)
        .await;

        observe_query("create_meeting", start, result, MEETING_CONFLICT)?;
        Ok(())
    }

    #[instrument(skip_all, name = "huddle.repo.get_meeting")]
    async fn get(&self, meeting_id: &str) -> Result<Option<Meeting>, HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            SELECT meeting_id, name, owner_id, organizers, participants,
                   invite_quota, created_at, version
            FROM meetings
            WHERE meeting_id = $1
            "#,
        )
        .bind(meeting_id)
        .fetch_optional(&self.pool)
        .await;

        let row = observe_query("get_meeting", start, result, MEETING_CONFLICT)?;
        Ok(row.map(map_row_to_meeting))
    }

    #[instrument(skip_all, name = "huddle.repo.update_meeting")]
    async fn update(&self, meeting: &Meeting) -> Result<bool, HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            UPDATE meetings
            SET name = $2, organizers = $3, participants = $4, invite_quota = $5,
                version = version + 1
            WHERE meeting_id = $1 AND version = $6
            "#,
        )
        .bind(&meeting.id) // $1
        .bind(&meeting.name) // $2
        .bind(role_vec(&meeting.organizers)) // $3
        .bind(role_vec(&meeting.participants)) // $4
        .bind(meeting.invite_quota) // $5
        .bind(meeting.version) // $6
        .execute(&self.pool)
        .await;

        let done = observe_query("update_meeting", start, result, MEETING_CONFLICT)?;
        Ok(done.rows_affected() > 0)
    }

    #[instrument(skip_all, name = "huddle.repo.list_meetings_for_account")]
    async fn list_for_account(&self, account_id: &str) -> Result<Vec<Meeting>, HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(LIST_FOR_ACCOUNT_SQL)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await;

        let rows = observe_query("list_meetings_for_account", start, result, MEETING_CONFLICT)?;
        Ok(rows.into_iter().map(map_row_to_meeting).collect())
    }

    #[instrument(skip_all, name = "huddle.repo.count_meetings_for_account")]
    async fn count_for_account(&self, account_id: &str) -> Result<u64, HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(COUNT_FOR_ACCOUNT_SQL)
            .bind(account_id)
            .fetch_one(&self.pool)
            .await;

        let row = observe_query("count_meetings_for_account", start, result, MEETING_CONFLICT)?;
        Ok(count_to_u64(row.get("count")))
    }

    #[instrument(skip_all, name = "huddle.repo.delete_meeting")]
    async fn delete(&self, meeting_id: &str) -> Result<bool, HuddleError> {
        let start = Instant::now();

        let result = sqlx::query("DELETE FROM meetings WHERE meeting_id = $1")
            .bind(meeting_id)
            .execute(&self.pool)
            .await;

        let done = observe_query("delete_meeting", start, result, MEETING_CONFLICT)?;
        Ok(done.rows_affected() > 0)
    }
}

fn role_vec(roles: &std::collections::BTreeSet<String>) -> Vec<String> {
    roles.iter().cloned().collect()
}

/// Map a `meetings` row. Array columns collapse into sets, dropping any
/// duplicates written by older clients.
fn map_row_to_meeting(row: PgRow) -> Meeting {
    let organizers: Vec<String> = row.get("organizers");
    let participants: Vec<String> = row.get("participants");

    Meeting {
        id: row.get("meeting_id"),
        name: row.get("name"),
        owner_id: row.get("owner_id"),
        organizers: organizers.into_iter().collect(),
        participants: participants.into_iter().collect(),
        invite_quota: row.get("invite_quota"),
        created_at: row.get("created_at"),
        version: row.get("version"),
    }
}
