//! Repository layer for Huddle.
//!
//! Three store ports (`AccountStore`, `MeetingStore`, `InvitationStore`)
//! with Postgres implementations for production and in-memory
//! implementations (`memory`) for tests.
//!
//! Absent documents are `Ok(None)` / `Ok(false)`. Only transport and storage
//! failures are `HuddleError::Database`. Services rely on that distinction
//! to tell stale references apart from outages.

pub mod accounts;
pub mod invitations;
pub mod meetings;
pub mod memory;

pub use accounts::AccountsRepository;
pub use invitations::InvitationsRepository;
pub use meetings::MeetingsRepository;

use crate::errors::HuddleError;
use crate::models::{Account, Invitation, Meeting};
use crate::observability::metrics;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Instant;

/// Account persistence.
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account.
    ///
    /// Fails `Conflict` if the id or the display name is already taken.
    async fn create(&self, account: &Account) -> Result<(), HuddleError>;

    async fn get(&self, account_id: &str) -> Result<Option<Account>, HuddleError>;

    async fn get_by_display_name(&self, display_name: &str)
        -> Result<Option<Account>, HuddleError>;

    /// Replace the mutable fields of an existing account.
    ///
    /// Fails `NotFound` if absent and `Conflict` on a display name clash.
    async fn update(&self, account: &Account) -> Result<(), HuddleError>;

    /// Returns `false` if the account did not exist.
    async fn delete(&self, account_id: &str) -> Result<bool, HuddleError>;
}

/// Meeting persistence. Role sets are written as a whole.
#[async_trait::async_trait]
pub trait MeetingStore: Send + Sync {
    async fn create(&self, meeting: &Meeting) -> Result<(), HuddleError>;

    async fn get(&self, meeting_id: &str) -> Result<Option<Meeting>, HuddleError>;

    /// Replace name, role sets and quota if the stored version still equals
    /// `meeting.version`, bumping it by one.
    ///
    /// Returns `false` when the meeting is absent or was written since it
    /// was read.
    async fn update(&self, meeting: &Meeting) -> Result<bool, HuddleError>;

    /// Meetings where the account is owner, organizer or participant.
    async fn list_for_account(&self, account_id: &str) -> Result<Vec<Meeting>, HuddleError>;

    async fn count_for_account(&self, account_id: &str) -> Result<u64, HuddleError>;

    /// Returns `false` if the meeting did not exist.
    async fn delete(&self, meeting_id: &str) -> Result<bool, HuddleError>;
}

/// Invitation persistence.
///
/// Implementations enforce at most one invitation per
/// (`receiver_id`, `meeting_id`) and fail `Conflict` on a second insert.
#[async_trait::async_trait]
pub trait InvitationStore: Send + Sync {
    async fn create(&self, invitation: &Invitation) -> Result<(), HuddleError>;

    async fn get(&self, invite_id: &str) -> Result<Option<Invitation>, HuddleError>;

    async fn get_by_receiver_and_meeting(
        &self,
        receiver_id: &str,
        meeting_id: &str,
    ) -> Result<Option<Invitation>, HuddleError>;

    async fn list_by_receiver(&self, receiver_id: &str) -> Result<Vec<Invitation>, HuddleError>;

    async fn count_by_receiver(&self, receiver_id: &str) -> Result<u64, HuddleError>;

    async fn list_by_meeting(&self, meeting_id: &str) -> Result<Vec<Invitation>, HuddleError>;

    async fn count_by_meeting(&self, meeting_id: &str) -> Result<u64, HuddleError>;

    /// Returns `false` if the invitation did not exist.
    async fn delete(&self, invite_id: &str) -> Result<bool, HuddleError>;
}

/// The three store ports, wired once at startup and handed to services.
#[derive(Clone)]
pub struct Stores {
    pub accounts: Arc<dyn AccountStore>,
    pub meetings: Arc<dyn MeetingStore>,
    pub invitations: Arc<dyn InvitationStore>,
}

impl Stores {
    /// Postgres-backed stores sharing one pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            accounts: Arc::new(AccountsRepository::new(pool.clone())),
            meetings: Arc::new(MeetingsRepository::new(pool.clone())),
            invitations: Arc::new(InvitationsRepository::new(pool)),
        }
    }
}

/// Record query metrics and map the sqlx error.
///
/// Unique violations become `Conflict` with `conflict_message`; everything
/// else is `Database`.
pub(crate) fn observe_query<T>(
    operation: &'static str,
    start: Instant,
    result: Result<T, sqlx::Error>,
    conflict_message: &str,
) -> Result<T, HuddleError> {
    let duration = start.elapsed();
    match result {
        Ok(value) => {
            metrics::record_db_query(operation, "success", duration);
            Ok(value)
        }
        Err(e) if is_unique_violation(&e) => {
            metrics::record_db_query(operation, "conflict", duration);
            Err(HuddleError::Conflict(conflict_message.to_string()))
        }
        Err(e) => {
            metrics::record_db_query(operation, "error", duration);
            Err(HuddleError::Database(e.to_string()))
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

/// Postgres `COUNT(*)` is a signed bigint; it is never negative.
pub(crate) fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}
