//! Invitation state machine.
//!
//! An invitation record is the pending state. Every terminal outcome
//! (accepted, rejected, reaped) deletes it:
//!
//! ```text
//! none --send--> pending --accept--> (deleted, receiver joined)
//!                        --reject--> (deleted)
//!                        --stale---> (deleted on next accept/reject)
//! ```
//!
//! An invitation is stale when its meeting is gone, its receiver account is
//! gone, or its sender lost organizer rights. Stale invitations are removed
//! on access and reported as a successful outcome.
//!
//! Accept writes the meeting before deleting the invitation. The two writes
//! are not atomic, so a retried accept sees the receiver already present and
//! only removes the invitation. The meeting write is version-checked, so
//! concurrent accepts into one meeting each re-read and re-apply instead of
//! overwriting one another.

use super::{quota, with_deadline, write_meeting, Deadlines, MeetingWrite};
use crate::errors::HuddleError;
use crate::models::{AcceptOutcome, DeleteInviteOutcome, Invitation, Meeting, StaleReason};
use crate::observability::metrics;
use crate::repositories::Stores;
use chrono::Utc;
use common::ids::IdGenerator;
use std::sync::Arc;
use tracing::instrument;

/// Orchestrates the three stores for invitation operations.
pub struct InvitationService {
    stores: Stores,
    ids: Arc<dyn IdGenerator>,
    deadlines: Deadlines,
}

impl InvitationService {
    pub fn new(stores: Stores, ids: Arc<dyn IdGenerator>, deadlines: Deadlines) -> Self {
        Self {
            stores,
            ids,
            deadlines,
        }
    }

    /// Invite `receiver_id` to a meeting on behalf of `sender_id`.
    ///
    /// # Errors
    ///
    /// - `NotFound` - meeting or receiver account absent
    /// - `Forbidden` - sender is not an organizer
    /// - `Conflict` - receiver already a member, or an invitation for the
    ///   pair already exists (including one created concurrently)
    /// - `QuotaExceeded` - the meeting's invite quota is used up
    #[instrument(skip_all, name = "huddle.service.send_invite", fields(meeting_id = %meeting_id))]
    pub async fn send(
        &self,
        meeting_id: &str,
        receiver_id: &str,
        sender_id: &str,
    ) -> Result<Invitation, HuddleError> {
        with_deadline(
            "send_invite",
            self.deadlines.operation,
            self.send_inner(meeting_id, receiver_id, sender_id),
        )
        .await
    }

    async fn send_inner(
        &self,
        meeting_id: &str,
        receiver_id: &str,
        sender_id: &str,
    ) -> Result<Invitation, HuddleError> {
        let meeting = self.require_meeting(meeting_id).await?;

        // Checked before any lookup so non-organizers learn nothing about
        // receivers or pending invitations
        if !meeting.is_organizer(sender_id) {
            return Err(HuddleError::Forbidden(
                "Only organizers can send invitations".to_string(),
            ));
        }

        if self.stores.accounts.get(receiver_id).await?.is_none() {
            return Err(HuddleError::NotFound(
                "Receiver account not found".to_string(),
            ));
        }

        if meeting.is_participant(receiver_id) {
            return Err(HuddleError::Conflict(
                "Account is already a member of this meeting".to_string(),
            ));
        }

        if self
            .stores
            .invitations
            .get_by_receiver_and_meeting(receiver_id, meeting_id)
            .await?
            .is_some()
        {
            return Err(HuddleError::Conflict(
                "An invitation for this account and meeting already exists".to_string(),
            ));
        }

        let pending = self.stores.invitations.count_by_meeting(meeting_id).await?;
        quota::check_invite_quota(pending, &meeting)?;

        let invitation = Invitation {
            id: self.ids.next_id(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            meeting_id: meeting_id.to_string(),
            timestamp: Utc::now(),
        };

        // The store rejects a concurrent duplicate with Conflict
        self.stores.invitations.create(&invitation).await?;

        tracing::info!(
            target: "huddle.service.invitations",
            invite_id = %invitation.id,
            meeting_id = %meeting_id,
            "Invitation sent"
        );
        metrics::record_invitation_transition("sent", None);

        Ok(invitation)
    }

    /// Accept an invitation as its receiver.
    ///
    /// # Errors
    ///
    /// - `NotFound` - invitation absent
    /// - `Forbidden` - caller is not the receiver
    /// - `Database` - meeting write failed (invitation left pending) or the
    ///   invitation delete failed (receiver already joined; retry is safe)
    #[instrument(skip_all, name = "huddle.service.accept_invite", fields(invite_id = %invite_id))]
    pub async fn accept(&self, invite_id: &str, caller_id: &str) -> Result<AcceptOutcome, HuddleError> {
        with_deadline(
            "accept_invite",
            self.deadlines.operation,
            self.accept_inner(invite_id, caller_id),
        )
        .await
    }

    async fn accept_inner(
        &self,
        invite_id: &str,
        caller_id: &str,
    ) -> Result<AcceptOutcome, HuddleError> {
        let invitation = self.require_invitation(invite_id).await?;

        if invitation.receiver_id != caller_id {
            return Err(HuddleError::Forbidden(
                "Only the receiver can accept an invitation".to_string(),
            ));
        }

        let Some(meeting) = self.stores.meetings.get(&invitation.meeting_id).await? else {
            let reason = self.reap(&invitation, StaleReason::MeetingGone).await?;
            return Ok(AcceptOutcome::Stale { reason });
        };

        if self
            .stores
            .accounts
            .get(&invitation.receiver_id)
            .await?
            .is_none()
        {
            let reason = self.reap(&invitation, StaleReason::ReceiverGone).await?;
            return Ok(AcceptOutcome::Stale { reason });
        }

        // Membership first: if this fails the invitation stays pending
        let receiver_id = invitation.receiver_id.as_str();
        let written = write_meeting(&*self.stores.meetings, meeting, |m| {
            Ok(m.add_participant(receiver_id))
        })
        .await?;

        match written {
            MeetingWrite::Written(_) => {}
            MeetingWrite::Unchanged(_) => {
                self.stores.invitations.delete(&invitation.id).await?;
                tracing::info!(
                    target: "huddle.service.invitations",
                    invite_id = %invitation.id,
                    meeting_id = %invitation.meeting_id,
                    "Invitation accepted by existing member"
                );
                metrics::record_invitation_transition("already_member", None);
                return Ok(AcceptOutcome::AlreadyMember);
            }
            MeetingWrite::Gone => {
                let reason = self.reap(&invitation, StaleReason::MeetingGone).await?;
                return Ok(AcceptOutcome::Stale { reason });
            }
        }

        self.stores.invitations.delete(&invitation.id).await?;

        tracing::info!(
            target: "huddle.service.invitations",
            invite_id = %invitation.id,
            meeting_id = %invitation.meeting_id,
            "Invitation accepted"
        );
        metrics::record_invitation_transition("accepted", None);

        Ok(AcceptOutcome::Joined)
    }

    /// Reject (as receiver) or withdraw (as organizer) an invitation.
    ///
    /// Stale invitations are removed for any caller.
    ///
    /// # Errors
    ///
    /// - `NotFound` - invitation absent
    /// - `Forbidden` - caller is neither an organizer nor the receiver
    #[instrument(skip_all, name = "huddle.service.delete_invite", fields(invite_id = %invite_id))]
    pub async fn delete(
        &self,
        invite_id: &str,
        caller_id: &str,
    ) -> Result<DeleteInviteOutcome, HuddleError> {
        with_deadline(
            "delete_invite",
            self.deadlines.operation,
            self.delete_inner(invite_id, caller_id),
        )
        .await
    }

    async fn delete_inner(
        &self,
        invite_id: &str,
        caller_id: &str,
    ) -> Result<DeleteInviteOutcome, HuddleError> {
        let invitation = self.require_invitation(invite_id).await?;

        let Some(meeting) = self.stores.meetings.get(&invitation.meeting_id).await? else {
            let reason = self.reap(&invitation, StaleReason::MeetingGone).await?;
            return Ok(DeleteInviteOutcome::Stale { reason });
        };

        if !meeting.is_organizer(&invitation.sender_id) {
            let reason = self.reap(&invitation, StaleReason::SenderRevoked).await?;
            return Ok(DeleteInviteOutcome::Stale { reason });
        }

        if !meeting.is_organizer(caller_id) && invitation.receiver_id != caller_id {
            return Err(HuddleError::Forbidden(
                "Only organizers or the receiver can delete an invitation".to_string(),
            ));
        }

        if !self.stores.invitations.delete(&invitation.id).await? {
            return Err(HuddleError::NotFound("Invitation not found".to_string()));
        }

        tracing::info!(
            target: "huddle.service.invitations",
            invite_id = %invitation.id,
            meeting_id = %invitation.meeting_id,
            by_receiver = invitation.receiver_id == caller_id,
            "Invitation deleted"
        );
        metrics::record_invitation_transition("rejected", None);

        Ok(DeleteInviteOutcome::Removed)
    }

    /// Fetch one invitation.
    ///
    /// Visible to its receiver, its sender and members of its meeting.
    #[instrument(skip_all, name = "huddle.service.get_invite", fields(invite_id = %invite_id))]
    pub async fn get(&self, invite_id: &str, caller_id: &str) -> Result<Invitation, HuddleError> {
        with_deadline(
            "get_invite",
            self.deadlines.operation,
            self.get_inner(invite_id, caller_id),
        )
        .await
    }

    async fn get_inner(&self, invite_id: &str, caller_id: &str) -> Result<Invitation, HuddleError> {
        let invitation = self.require_invitation(invite_id).await?;

        if invitation.receiver_id == caller_id || invitation.sender_id == caller_id {
            return Ok(invitation);
        }

        let visible_to_member = self
            .stores
            .meetings
            .get(&invitation.meeting_id)
            .await?
            .is_some_and(|m| m.is_participant(caller_id));

        if visible_to_member {
            Ok(invitation)
        } else {
            Err(HuddleError::Forbidden(
                "Not allowed to view this invitation".to_string(),
            ))
        }
    }

    /// Pending invitations addressed to the caller.
    #[instrument(skip_all, name = "huddle.service.list_received_invites")]
    pub async fn list_for_receiver(&self, caller_id: &str) -> Result<Vec<Invitation>, HuddleError> {
        with_deadline(
            "list_received_invites",
            self.deadlines.operation,
            self.stores.invitations.list_by_receiver(caller_id),
        )
        .await
    }

    #[instrument(skip_all, name = "huddle.service.count_received_invites")]
    pub async fn count_for_receiver(&self, caller_id: &str) -> Result<u64, HuddleError> {
        with_deadline(
            "count_received_invites",
            self.deadlines.operation,
            self.stores.invitations.count_by_receiver(caller_id),
        )
        .await
    }

    /// Pending invitations of a meeting. Caller must be a member.
    #[instrument(skip_all, name = "huddle.service.list_meeting_invites", fields(meeting_id = %meeting_id))]
    pub async fn list_for_meeting(
        &self,
        meeting_id: &str,
        caller_id: &str,
    ) -> Result<Vec<Invitation>, HuddleError> {
        with_deadline("list_meeting_invites", self.deadlines.operation, async {
            self.require_member(meeting_id, caller_id).await?;
            self.stores.invitations.list_by_meeting(meeting_id).await
        })
        .await
    }

    #[instrument(skip_all, name = "huddle.service.count_meeting_invites", fields(meeting_id = %meeting_id))]
    pub async fn count_for_meeting(
        &self,
        meeting_id: &str,
        caller_id: &str,
    ) -> Result<u64, HuddleError> {
        with_deadline("count_meeting_invites", self.deadlines.operation, async {
            self.require_member(meeting_id, caller_id).await?;
            self.stores.invitations.count_by_meeting(meeting_id).await
        })
        .await
    }

    async fn require_invitation(&self, invite_id: &str) -> Result<Invitation, HuddleError> {
        self.stores
            .invitations
            .get(invite_id)
            .await?
            .ok_or_else(|| HuddleError::NotFound("Invitation not found".to_string()))
    }

    async fn require_meeting(&self, meeting_id: &str) -> Result<Meeting, HuddleError> {
        self.stores
            .meetings
            .get(meeting_id)
            .await?
            .ok_or_else(|| HuddleError::NotFound("Meeting not found".to_string()))
    }

    async fn require_member(&self, meeting_id: &str, caller_id: &str) -> Result<Meeting, HuddleError> {
        let meeting = self.require_meeting(meeting_id).await?;
        if !meeting.is_participant(caller_id) {
            return Err(HuddleError::Forbidden(
                "Only meeting members can view its invitations".to_string(),
            ));
        }
        Ok(meeting)
    }

    /// Delete a stale invitation. A concurrent delete is not an error.
    async fn reap(
        &self,
        invitation: &Invitation,
        reason: StaleReason,
    ) -> Result<StaleReason, HuddleError> {
        let removed = self.stores.invitations.delete(&invitation.id).await?;

        tracing::info!(
            target: "huddle.service.invitations",
            invite_id = %invitation.id,
            meeting_id = %invitation.meeting_id,
            reason = reason.as_str(),
            removed = removed,
            "Stale invitation reaped"
        );
        metrics::record_invitation_transition("reaped", Some(reason.as_str()));

        Ok(reason)
    }
}
