//! Huddle models.
//!
//! Entities (`Account`, `Meeting`, `Invitation`), the membership model over
//! a meeting's role sets, operation outcomes, and HTTP request/response
//! payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Minimum display name length in characters (after trimming).
pub const MIN_DISPLAY_NAME_LENGTH: usize = 2;

/// Maximum display name length in characters (after trimming).
pub const MAX_DISPLAY_NAME_LENGTH: usize = 32;

/// Maximum meeting name length in characters (after trimming).
pub const MAX_MEETING_NAME_LENGTH: usize = 100;

// ============================================================================
// Entities
// ============================================================================

/// A registered identity.
///
/// `id` is the subject issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    /// Concurrent meetings this account may own, organize or join.
    pub meeting_quota: i32,
    pub created_at: DateTime<Utc>,
}

/// A meeting and its role sets.
///
/// The owner is implicitly an organizer and is never stored in either set.
/// An account id appears in at most one of `organizers` and `participants`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub organizers: BTreeSet<String>,
    pub participants: BTreeSet<String>,
    /// Outstanding invitations this meeting may have at once.
    pub invite_quota: i32,
    pub created_at: DateTime<Utc>,
    /// Bumped by every stored write. Writes carrying an older value are
    /// refused by the store.
    #[serde(default)]
    pub version: i64,
}

impl Meeting {
    /// A meeting with only its owner.
    pub fn new(
        id: String,
        name: String,
        owner_id: String,
        invite_quota: i32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            owner_id,
            organizers: BTreeSet::new(),
            participants: BTreeSet::new(),
            invite_quota,
            created_at,
            version: 0,
        }
    }

    pub fn is_owner(&self, account_id: &str) -> bool {
        self.owner_id == account_id
    }

    /// Owner or explicit organizer.
    pub fn is_organizer(&self, account_id: &str) -> bool {
        self.is_owner(account_id) || self.organizers.contains(account_id)
    }

    /// Any member: owner, organizer or participant.
    pub fn is_participant(&self, account_id: &str) -> bool {
        self.is_organizer(account_id) || self.participants.contains(account_id)
    }

    /// Adds a participant. Returns `false` if the account was already a member.
    pub fn add_participant(&mut self, account_id: &str) -> bool {
        if self.is_participant(account_id) {
            return false;
        }
        self.participants.insert(account_id.to_string())
    }

    /// Promotes an account to organizer, moving it out of `participants`.
    ///
    /// Returns `false` for the owner and for existing organizers.
    pub fn add_organizer(&mut self, account_id: &str) -> bool {
        if self.is_organizer(account_id) {
            return false;
        }
        self.participants.remove(account_id);
        self.organizers.insert(account_id.to_string())
    }

    /// Demotes an organizer back to participant.
    ///
    /// Returns `false` when the account is not an explicit organizer. The
    /// owner cannot be demoted.
    pub fn revoke_organizer(&mut self, account_id: &str) -> bool {
        if !self.organizers.remove(account_id) {
            return false;
        }
        self.participants.insert(account_id.to_string());
        true
    }

    /// Drops an account from both role sets. The owner cannot be removed.
    pub fn remove_member(&mut self, account_id: &str) -> bool {
        let was_organizer = self.organizers.remove(account_id);
        let was_participant = self.participants.remove(account_id);
        was_organizer || was_participant
    }

    /// Owner plus both role sets.
    pub fn member_count(&self) -> usize {
        1 + self.organizers.len() + self.participants.len()
    }
}

/// A pending offer for `receiver_id` to join `meeting_id`.
///
/// The record is the pending state. Accepting, rejecting or reaping it
/// deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub meeting_id: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why an invitation was reaped instead of processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleReason {
    /// The referenced meeting no longer exists.
    MeetingGone,
    /// The receiving account no longer exists.
    ReceiverGone,
    /// The sender is no longer an organizer of the meeting.
    SenderRevoked,
}

impl StaleReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaleReason::MeetingGone => "meeting_gone",
            StaleReason::ReceiverGone => "receiver_gone",
            StaleReason::SenderRevoked => "sender_revoked",
        }
    }
}

/// Result of accepting an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AcceptOutcome {
    /// The receiver was added to the meeting.
    Joined,
    /// The receiver was already a member; only the invitation was removed.
    AlreadyMember,
    /// The invitation was stale and has been removed.
    Stale { reason: StaleReason },
}

/// Result of rejecting or withdrawing an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteInviteOutcome {
    Removed,
    Stale { reason: StaleReason },
}

/// One item a best-effort loop could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub id: String,
    pub reason: String,
}

/// Per-item outcome of a best-effort cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub removed: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

impl CascadeReport {
    pub fn record_removed(&mut self, id: impl Into<String>) {
        self.removed.push(id.into());
    }

    pub fn record_failure(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(ItemFailure {
            id: id.into(),
            reason: reason.into(),
        });
    }

    /// True when no item failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Result of deleting a meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingDeletion {
    pub meeting_id: String,
    pub invites: CascadeReport,
}

/// Result of deleting an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountDeletion {
    pub account_id: String,
    /// Pending invitations addressed to the account.
    pub invites: CascadeReport,
    /// Meetings the account was removed from.
    pub memberships: CascadeReport,
}

/// Result of creating a meeting with an initial participant list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetingCreation {
    pub meeting: Meeting,
    pub invites: Vec<Invitation>,
    /// Proposed participants that did not get an invitation.
    pub skipped: Vec<ItemFailure>,
}

// ============================================================================
// Requests / Responses
// ============================================================================

/// Body of `POST /api/v1/accounts` and `PATCH /api/v1/accounts/@me`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisplayNameRequest {
    pub display_name: String,
}

impl DisplayNameRequest {
    /// Trimmed display name, if within length bounds.
    pub fn validated_display_name(&self) -> Result<&str, &'static str> {
        validate_display_name(&self.display_name)
    }
}

/// Trim and bound-check a display name.
pub fn validate_display_name(raw: &str) -> Result<&str, &'static str> {
    let display_name = raw.trim();
    let len = display_name.chars().count();

    if len < MIN_DISPLAY_NAME_LENGTH {
        return Err("Display name must be at least 2 characters");
    }
    if len > MAX_DISPLAY_NAME_LENGTH {
        return Err("Display name must be at most 32 characters");
    }

    Ok(display_name)
}

/// Body of `POST /api/v1/meetings`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMeetingRequest {
    pub name: String,

    /// Accounts to invite right away.
    #[serde(default)]
    pub participants: Vec<String>,
}

impl CreateMeetingRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        let name = self.name.trim();

        if name.is_empty() {
            return Err("Meeting name is required");
        }
        if name.chars().count() > MAX_MEETING_NAME_LENGTH {
            return Err("Meeting name must be at most 100 characters");
        }
        if self.participants.iter().any(|p| p.trim().is_empty()) {
            return Err("Participant ids must not be empty");
        }

        Ok(())
    }
}

/// Body of `POST /api/v1/invites`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendInviteRequest {
    pub meeting_id: String,
    pub receiver_id: String,
}

/// Response body for count endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Readiness probe response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_provider: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
