//! Service layer for Huddle.
//!
//! Each public service method is one orchestration entry point. It runs
//! under a fixed deadline, reads through the store ports, applies the
//! membership and quota decisions, writes, and returns a domain value or a
//! typed `HuddleError`.
//!
//! # Components
//!
//! - `accounts` - Account registration, profile updates and guarded deletion
//! - `invitations` - Invitation state machine (send, accept, reject, reads)
//! - `meetings` - Meeting creation with initial invites, reads, role changes,
//!   cascading deletion
//! - `quota` - Pure quota checks

pub mod accounts;
pub mod invitations;
pub mod meetings;
pub mod quota;

pub use accounts::AccountService;
pub use invitations::InvitationService;
pub use meetings::MeetingService;

use crate::config::Config;
use crate::errors::HuddleError;
use crate::models::Meeting;
use crate::observability::metrics;
use crate::repositories::{MeetingStore, Stores};
use common::ids::IdGenerator;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Per-call deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    /// Single-entity operations.
    pub operation: Duration,
    /// Cascading deletes and meeting creation fan-out.
    pub cascade: Duration,
}

impl Deadlines {
    pub fn from_config(config: &Config) -> Self {
        Self {
            operation: config.operation_timeout(),
            cascade: config.cascade_timeout(),
        }
    }
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            operation: Duration::from_secs(crate::config::DEFAULT_OPERATION_TIMEOUT_SECONDS),
            cascade: Duration::from_secs(crate::config::DEFAULT_CASCADE_TIMEOUT_SECONDS),
        }
    }
}

/// Run `fut` to completion or fail with `HuddleError::Timeout`.
///
/// On expiry the future is dropped, which cancels any store call still in
/// flight.
pub(crate) async fn with_deadline<T, F>(
    operation: &'static str,
    deadline: Duration,
    fut: F,
) -> Result<T, HuddleError>
where
    F: Future<Output = Result<T, HuddleError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                target: "huddle.service.deadline",
                operation = operation,
                deadline_ms = deadline.as_millis() as u64,
                "Operation abandoned at deadline"
            );
            metrics::record_deadline_exceeded(operation);
            Err(HuddleError::Timeout(operation.to_string()))
        }
    }
}

/// Attempts made by `write_meeting` before reporting a conflict.
const MAX_MEETING_WRITE_ATTEMPTS: usize = 3;

/// Result of a read-modify-write on a meeting.
#[derive(Debug)]
pub(crate) enum MeetingWrite {
    /// The change was stored. Carries the meeting as written.
    Written(Meeting),
    /// `apply` reported nothing to change.
    Unchanged(Meeting),
    /// The meeting disappeared between attempts.
    Gone,
}

/// Apply `apply` to `meeting` and store it, re-reading and re-applying when
/// another writer got there first.
///
/// `apply` returns whether it changed anything and may fail to abort the
/// write. It runs again against every fresh read.
///
/// # Errors
///
/// - `Conflict` - the meeting kept changing for every attempt
/// - whatever `apply` or the store returns
pub(crate) async fn write_meeting<F>(
    meetings: &dyn MeetingStore,
    mut meeting: Meeting,
    mut apply: F,
) -> Result<MeetingWrite, HuddleError>
where
    F: FnMut(&mut Meeting) -> Result<bool, HuddleError>,
{
    for attempt in 1..=MAX_MEETING_WRITE_ATTEMPTS {
        if !apply(&mut meeting)? {
            return Ok(MeetingWrite::Unchanged(meeting));
        }
        if meetings.update(&meeting).await? {
            meeting.version += 1;
            return Ok(MeetingWrite::Written(meeting));
        }

        tracing::debug!(
            target: "huddle.service.meetings",
            meeting_id = %meeting.id,
            attempt = attempt,
            "Meeting changed concurrently, retrying"
        );
        match meetings.get(&meeting.id).await? {
            Some(fresh) => meeting = fresh,
            None => return Ok(MeetingWrite::Gone),
        }
    }

    Err(HuddleError::Conflict(
        "Meeting was modified concurrently".to_string(),
    ))
}

/// All services, wired once at startup.
#[derive(Clone)]
pub struct Services {
    pub accounts: Arc<AccountService>,
    pub meetings: Arc<MeetingService>,
    pub invitations: Arc<InvitationService>,
}

impl Services {
    pub fn new(stores: Stores, ids: Arc<dyn IdGenerator>, config: &Config) -> Self {
        let deadlines = Deadlines::from_config(config);

        Self {
            accounts: Arc::new(AccountService::new(
                stores.clone(),
                deadlines,
                config.default_meeting_quota,
            )),
            meetings: Arc::new(MeetingService::new(
                stores.clone(),
                ids.clone(),
                deadlines,
                config.default_invite_quota,
            )),
            invitations: Arc::new(InvitationService::new(stores, ids, deadlines)),
        }
    }
}
