//! Meeting service.
//!
//! Creation with an initial participant list, reads, owner-initiated role
//! changes and cascading deletion.

use super::{quota, with_deadline, write_meeting, Deadlines, MeetingWrite};
use crate::errors::HuddleError;
use crate::models::{CascadeReport, Invitation, ItemFailure, Meeting, MeetingCreation, MeetingDeletion};
use crate::observability::metrics;
use crate::repositories::Stores;
use chrono::Utc;
use common::ids::IdGenerator;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

pub struct MeetingService {
    stores: Stores,
    ids: Arc<dyn IdGenerator>,
    deadlines: Deadlines,
    default_invite_quota: i32,
}

impl MeetingService {
    pub fn new(
        stores: Stores,
        ids: Arc<dyn IdGenerator>,
        deadlines: Deadlines,
        default_invite_quota: i32,
    ) -> Self {
        Self {
            stores,
            ids,
            deadlines,
            default_invite_quota,
        }
    }

    /// Create a meeting owned by the caller and invite the initial
    /// participants.
    ///
    /// Participant ids are de-duplicated and truncated to fit the invite
    /// quota. The owner and unknown accounts are skipped. A failed invite is
    /// reported in `skipped` and does not fail the creation.
    ///
    /// # Errors
    ///
    /// - `NotFound` - caller has no account
    /// - `QuotaExceeded` - caller is at its meeting limit
    #[instrument(skip_all, name = "huddle.service.create_meeting")]
    pub async fn create(
        &self,
        name: &str,
        participants: Vec<String>,
        caller_id: &str,
    ) -> Result<MeetingCreation, HuddleError> {
        with_deadline(
            "create_meeting",
            self.deadlines.cascade,
            self.create_inner(name, participants, caller_id),
        )
        .await
    }

    async fn create_inner(
        &self,
        name: &str,
        participants: Vec<String>,
        caller_id: &str,
    ) -> Result<MeetingCreation, HuddleError> {
        let account = self
            .stores
            .accounts
            .get(caller_id)
            .await?
            .ok_or_else(|| HuddleError::NotFound("Account not found".to_string()))?;

        let current = self.stores.meetings.count_for_account(caller_id).await?;
        quota::check_meeting_quota(current, &account)?;

        let meeting = Meeting::new(
            self.ids.next_id(),
            name.trim().to_string(),
            caller_id.to_string(),
            self.default_invite_quota,
            Utc::now(),
        );
        self.stores.meetings.create(&meeting).await?;

        tracing::info!(
            target: "huddle.service.meetings",
            meeting_id = %meeting.id,
            "Meeting created"
        );

        let mut skipped = Vec::new();
        let mut seen = HashSet::new();
        let mut proposed = Vec::with_capacity(participants.len());
        for participant in participants {
            let participant = participant.trim().to_string();
            if !seen.insert(participant.clone()) {
                continue;
            }
            if participant == caller_id {
                skipped.push(ItemFailure {
                    id: participant,
                    reason: "self".to_string(),
                });
                continue;
            }
            proposed.push(participant);
        }

        let before = proposed.len();
        let proposed = quota::truncate_initial_invites(proposed, meeting.invite_quota);
        if proposed.len() < before {
            tracing::debug!(
                target: "huddle.service.meetings",
                meeting_id = %meeting.id,
                proposed = before,
                kept = proposed.len(),
                "Initial participant list truncated"
            );
        }

        let mut invites = Vec::with_capacity(proposed.len());
        for receiver_id in proposed {
            match self.invite_initial(&meeting, &receiver_id).await {
                Ok(Some(invitation)) => invites.push(invitation),
                Ok(None) => skipped.push(ItemFailure {
                    id: receiver_id,
                    reason: "unknown_account".to_string(),
                }),
                Err(e) => {
                    tracing::warn!(
                        target: "huddle.service.meetings",
                        meeting_id = %meeting.id,
                        error = %e,
                        "Initial invitation failed"
                    );
                    skipped.push(ItemFailure {
                        id: receiver_id,
                        reason: e.error_type().to_string(),
                    });
                }
            }
        }

        Ok(MeetingCreation {
            meeting,
            invites,
            skipped,
        })
    }

    /// `Ok(None)` when the receiver has no account.
    async fn invite_initial(
        &self,
        meeting: &Meeting,
        receiver_id: &str,
    ) -> Result<Option<Invitation>, HuddleError> {
        if self.stores.accounts.get(receiver_id).await?.is_none() {
            return Ok(None);
        }

        let invitation = Invitation {
            id: self.ids.next_id(),
            sender_id: meeting.owner_id.clone(),
            receiver_id: receiver_id.to_string(),
            meeting_id: meeting.id.clone(),
            timestamp: Utc::now(),
        };
        self.stores.invitations.create(&invitation).await?;
        metrics::record_invitation_transition("sent", None);

        Ok(Some(invitation))
    }

    /// Fetch a meeting. Caller must be a member.
    #[instrument(skip_all, name = "huddle.service.get_meeting", fields(meeting_id = %meeting_id))]
    pub async fn get(&self, meeting_id: &str, caller_id: &str) -> Result<Meeting, HuddleError> {
        with_deadline("get_meeting", self.deadlines.operation, async {
            let meeting = self.require_meeting(meeting_id).await?;
            if !meeting.is_participant(caller_id) {
                return Err(HuddleError::Forbidden(
                    "Only meeting members can view this meeting".to_string(),
                ));
            }
            Ok(meeting)
        })
        .await
    }

    /// Meetings the caller owns, organizes or participates in.
    #[instrument(skip_all, name = "huddle.service.list_meetings")]
    pub async fn list_for_account(&self, caller_id: &str) -> Result<Vec<Meeting>, HuddleError> {
        with_deadline(
            "list_meetings",
            self.deadlines.operation,
            self.stores.meetings.list_for_account(caller_id),
        )
        .await
    }

    #[instrument(skip_all, name = "huddle.service.count_meetings")]
    pub async fn count_for_account(&self, caller_id: &str) -> Result<u64, HuddleError> {
        with_deadline(
            "count_meetings",
            self.deadlines.operation,
            self.stores.meetings.count_for_account(caller_id),
        )
        .await
    }

    /// Delete a meeting and its pending invitations.
    ///
    /// Invitation deletes are best-effort; failures are reported and the
    /// meeting is deleted regardless. Leftover invitations are reaped as
    /// stale on their next access.
    ///
    /// # Errors
    ///
    /// - `NotFound` - meeting absent
    /// - `Forbidden` - caller is not the owner
    #[instrument(skip_all, name = "huddle.service.delete_meeting", fields(meeting_id = %meeting_id))]
    pub async fn delete(&self, meeting_id: &str, caller_id: &str) -> Result<MeetingDeletion, HuddleError> {
        with_deadline(
            "delete_meeting",
            self.deadlines.cascade,
            self.delete_inner(meeting_id, caller_id),
        )
        .await
    }

    async fn delete_inner(
        &self,
        meeting_id: &str,
        caller_id: &str,
    ) -> Result<MeetingDeletion, HuddleError> {
        let start = Instant::now();
        let meeting = self.require_meeting(meeting_id).await?;

        if !meeting.is_owner(caller_id) {
            return Err(HuddleError::Forbidden(
                "Only the owner can delete a meeting".to_string(),
            ));
        }

        let mut invites = CascadeReport::default();
        for invitation in self.stores.invitations.list_by_meeting(meeting_id).await? {
            match self.stores.invitations.delete(&invitation.id).await {
                Ok(_) => invites.record_removed(invitation.id),
                Err(e) => {
                    tracing::warn!(
                        target: "huddle.service.meetings",
                        meeting_id = %meeting_id,
                        invite_id = %invitation.id,
                        error = %e,
                        "Failed to delete invitation during meeting deletion"
                    );
                    invites.record_failure(invitation.id, e.error_type());
                }
            }
        }

        if !self.stores.meetings.delete(meeting_id).await? {
            return Err(HuddleError::NotFound("Meeting not found".to_string()));
        }

        metrics::record_cascade(
            "meeting",
            invites.removed.len(),
            invites.failed.len(),
            start.elapsed(),
        );
        tracing::info!(
            target: "huddle.service.meetings",
            meeting_id = %meeting_id,
            invites_removed = invites.removed.len(),
            invites_failed = invites.failed.len(),
            "Meeting deleted"
        );

        Ok(MeetingDeletion {
            meeting_id: meeting_id.to_string(),
            invites,
        })
    }

    /// Make a participant an organizer. Owner only.
    ///
    /// Promoting an existing organizer is a no-op.
    #[instrument(skip_all, name = "huddle.service.promote_organizer", fields(meeting_id = %meeting_id))]
    pub async fn promote_organizer(
        &self,
        meeting_id: &str,
        target_id: &str,
        caller_id: &str,
    ) -> Result<Meeting, HuddleError> {
        with_deadline("promote_organizer", self.deadlines.operation, async {
            let meeting = self.require_owned(meeting_id, caller_id).await?;

            let written = write_meeting(&*self.stores.meetings, meeting, |m| {
                if !m.is_participant(target_id) {
                    return Err(HuddleError::NotFound(
                        "Account is not a member of this meeting".to_string(),
                    ));
                }
                Ok(m.add_organizer(target_id))
            })
            .await?;

            match written {
                MeetingWrite::Written(meeting) => {
                    tracing::info!(
                        target: "huddle.service.meetings",
                        meeting_id = %meeting_id,
                        "Organizer promoted"
                    );
                    Ok(meeting)
                }
                MeetingWrite::Unchanged(meeting) => Ok(meeting),
                MeetingWrite::Gone => Err(HuddleError::NotFound("Meeting not found".to_string())),
            }
        })
        .await
    }

    /// Return an organizer to plain participant. Owner only.
    ///
    /// Invitations the organizer sent become stale.
    #[instrument(skip_all, name = "huddle.service.revoke_organizer", fields(meeting_id = %meeting_id))]
    pub async fn revoke_organizer(
        &self,
        meeting_id: &str,
        target_id: &str,
        caller_id: &str,
    ) -> Result<Meeting, HuddleError> {
        with_deadline("revoke_organizer", self.deadlines.operation, async {
            let meeting = self.require_owned(meeting_id, caller_id).await?;

            let written = write_meeting(&*self.stores.meetings, meeting, |m| {
                if !m.revoke_organizer(target_id) {
                    return Err(HuddleError::NotFound(
                        "Account is not an organizer of this meeting".to_string(),
                    ));
                }
                Ok(true)
            })
            .await?;

            match written {
                MeetingWrite::Written(meeting) | MeetingWrite::Unchanged(meeting) => {
                    tracing::info!(
                        target: "huddle.service.meetings",
                        meeting_id = %meeting_id,
                        "Organizer revoked"
                    );
                    Ok(meeting)
                }
                MeetingWrite::Gone => Err(HuddleError::NotFound("Meeting not found".to_string())),
            }
        })
        .await
    }

    async fn require_meeting(&self, meeting_id: &str) -> Result<Meeting, HuddleError> {
        self.stores
            .meetings
            .get(meeting_id)
            .await?
            .ok_or_else(|| HuddleError::NotFound("Meeting not found".to_string()))
    }

    async fn require_owned(&self, meeting_id: &str, caller_id: &str) -> Result<Meeting, HuddleError> {
        let meeting = self.require_meeting(meeting_id).await?;
        if !meeting.is_owner(caller_id) {
            return Err(HuddleError::Forbidden(
                "Only the owner can change organizers".to_string(),
            ));
        }
        Ok(meeting)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::Account;
    use crate::repositories::memory::MemoryStores;
    use crate::repositories::{AccountStore, MeetingStore};
    use common::ids::SequentialGenerator;

    async fn setup(invite_quota: i32) -> (MemoryStores, MeetingService) {
        let memory = MemoryStores::new();
        for (id, name) in [("u1", "alice"), ("u2", "bob"), ("u3", "carol")] {
            memory
                .accounts
                .create(&Account {
                    id: id.to_string(),
                    display_name: name.to_string(),
                    meeting_quota: 2,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        let service = MeetingService::new(
            memory.stores(),
            Arc::new(SequentialGenerator::new("id")),
            Deadlines::default(),
            invite_quota,
        );
        (memory, service)
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_create_skips_owner_duplicates_and_unknown_accounts() {
        let (_memory, service) = setup(10).await;

        let created = service
            .create("Standup", ids(&["u2", "u1", "u2", "ghost", "u3"]), "u1")
            .await
            .unwrap();

        assert_eq!(created.meeting.owner_id, "u1");
        assert_eq!(created.meeting.invite_quota, 10);
        let receivers: Vec<_> = created.invites.iter().map(|i| i.receiver_id.as_str()).collect();
        assert_eq!(receivers, vec!["u2", "u3"]);

        let skipped: Vec<_> = created
            .skipped
            .iter()
            .map(|s| (s.id.as_str(), s.reason.as_str()))
            .collect();
        assert_eq!(skipped, vec![("u1", "self"), ("ghost", "unknown_account")]);
    }

    #[tokio::test]
    async fn test_create_truncates_oversized_initial_list() {
        let (_memory, service) = setup(2).await;

        let created = service
            .create("Standup", ids(&["u2", "u3", "ghost"]), "u1")
            .await
            .unwrap();

        assert_eq!(created.invites.len(), 1);
        assert!(created.skipped.is_empty());
    }

    #[tokio::test]
    async fn test_create_enforces_meeting_quota() {
        let (_memory, service) = setup(10).await;
        service.create("One", Vec::new(), "u1").await.unwrap();
        service.create("Two", Vec::new(), "u1").await.unwrap();

        let result = service.create("Three", Vec::new(), "u1").await;
        assert!(matches!(result, Err(HuddleError::QuotaExceeded(_))));
    }

    #[tokio::test]
    async fn test_create_without_account_is_not_found() {
        let (_memory, service) = setup(10).await;
        let result = service.create("Standup", Vec::new(), "nobody").await;
        assert!(matches!(result, Err(HuddleError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_promote_requires_membership_and_ownership() {
        let (memory, service) = setup(10).await;
        let created = service.create("Standup", Vec::new(), "u1").await.unwrap();
        let id = created.meeting.id;

        assert!(matches!(
            service.promote_organizer(&id, "u2", "u1").await,
            Err(HuddleError::NotFound(_))
        ));

        let mut meeting = memory.meetings.get(&id).await.unwrap().unwrap();
        meeting.add_participant("u2");
        meeting.add_participant("u3");
        assert!(memory.meetings.update(&meeting).await.unwrap());

        assert!(matches!(
            service.promote_organizer(&id, "u3", "u2").await,
            Err(HuddleError::Forbidden(_))
        ));

        let promoted = service.promote_organizer(&id, "u2", "u1").await.unwrap();
        assert!(promoted.organizers.contains("u2"));
        assert!(!promoted.participants.contains("u2"));
    }

    #[tokio::test]
    async fn test_revoke_rejects_owner_and_plain_participants() {
        let (memory, service) = setup(10).await;
        let created = service.create("Standup", Vec::new(), "u1").await.unwrap();
        let id = created.meeting.id;

        let mut meeting = memory.meetings.get(&id).await.unwrap().unwrap();
        meeting.add_participant("u2");
        assert!(memory.meetings.update(&meeting).await.unwrap());

        assert!(matches!(
            service.revoke_organizer(&id, "u1", "u1").await,
            Err(HuddleError::NotFound(_))
        ));
        assert!(matches!(
            service.revoke_organizer(&id, "u2", "u1").await,
            Err(HuddleError::NotFound(_))
        ));

        service.promote_organizer(&id, "u2", "u1").await.unwrap();
        let revoked = service.revoke_organizer(&id, "u2", "u1").await.unwrap();
        assert!(revoked.participants.contains("u2"));
        assert!(!revoked.is_organizer("u2"));
    }

    #[tokio::test]
    async fn test_get_requires_membership() {
        let (_memory, service) = setup(10).await;
        let created = service.create("Standup", Vec::new(), "u1").await.unwrap();

        assert!(service.get(&created.meeting.id, "u1").await.is_ok());
        assert!(matches!(
            service.get(&created.meeting.id, "u2").await,
            Err(HuddleError::Forbidden(_))
        ));
        assert!(matches!(
            service.get("missing", "u1").await,
            Err(HuddleError::NotFound(_))
        ));
    }
}
