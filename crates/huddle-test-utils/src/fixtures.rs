//! Service-level fixture over in-memory stores.

use chrono::Utc;
use common::ids::SequentialGenerator;
use huddle_service::models::{Account, Invitation, Meeting};
use huddle_service::repositories::memory::MemoryStores;
use huddle_service::repositories::{AccountStore, InvitationStore, MeetingStore};
use huddle_service::services::{AccountService, Deadlines, InvitationService, MeetingService, Services};
use std::sync::Arc;

/// Meeting quota of accounts created through [`TestWorld::account`].
pub const TEST_MEETING_QUOTA: i32 = 5;

/// Invite quota of meetings created through [`TestWorld::meeting`].
pub const TEST_INVITE_QUOTA: i32 = 10;

/// In-memory stores plus services with predictable ids.
///
/// Meeting and invitation ids come from one counter (`id-1`, `id-2`, ...).
/// Direct store access through `memory` bypasses the services, for seeding
/// and for fault injection.
pub struct TestWorld {
    pub memory: MemoryStores,
    pub services: Services,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::with_deadlines(Deadlines::default())
    }

    pub fn with_deadlines(deadlines: Deadlines) -> Self {
        let memory = MemoryStores::new();
        let stores = memory.stores();
        let ids = Arc::new(SequentialGenerator::new("id"));

        let services = Services {
            accounts: Arc::new(AccountService::new(
                stores.clone(),
                deadlines,
                TEST_MEETING_QUOTA,
            )),
            meetings: Arc::new(MeetingService::new(
                stores.clone(),
                ids.clone(),
                deadlines,
                TEST_INVITE_QUOTA,
            )),
            invitations: Arc::new(InvitationService::new(stores, ids, deadlines)),
        };

        Self { memory, services }
    }

    /// Seed an account directly in the store.
    pub async fn account(&self, id: &str, display_name: &str) -> Account {
        self.account_with_quota(id, display_name, TEST_MEETING_QUOTA)
            .await
    }

    pub async fn account_with_quota(&self, id: &str, display_name: &str, quota: i32) -> Account {
        let account = Account {
            id: id.to_string(),
            display_name: display_name.to_string(),
            meeting_quota: quota,
            created_at: Utc::now(),
        };
        self.memory
            .accounts
            .create(&account)
            .await
            .expect("seed account");
        account
    }

    /// Seed a meeting owned by `owner` directly in the store.
    pub async fn meeting(&self, id: &str, owner: &str) -> Meeting {
        self.meeting_with_quota(id, owner, TEST_INVITE_QUOTA).await
    }

    pub async fn meeting_with_quota(&self, id: &str, owner: &str, invite_quota: i32) -> Meeting {
        let meeting = Meeting::new(
            id.to_string(),
            format!("Meeting {id}"),
            owner.to_string(),
            invite_quota,
            Utc::now(),
        );
        self.memory
            .meetings
            .create(&meeting)
            .await
            .expect("seed meeting");
        meeting
    }

    /// Add members to a seeded meeting. Organizers are promoted after being
    /// added as participants.
    pub async fn add_members(&self, meeting_id: &str, organizers: &[&str], participants: &[&str]) {
        let mut meeting = self.stored_meeting(meeting_id).await.expect("meeting exists");
        for id in participants.iter().chain(organizers) {
            meeting.add_participant(id);
        }
        for id in organizers {
            meeting.add_organizer(id);
        }
        let written = self
            .memory
            .meetings
            .update(&meeting)
            .await
            .expect("update meeting");
        assert!(written, "meeting {meeting_id} changed while seeding");
    }

    pub async fn stored_meeting(&self, meeting_id: &str) -> Option<Meeting> {
        self.memory.meetings.get(meeting_id).await.expect("get meeting")
    }

    pub async fn stored_invite(&self, invite_id: &str) -> Option<Invitation> {
        self.memory
            .invitations
            .get(invite_id)
            .await
            .expect("get invitation")
    }

    pub async fn stored_account(&self, account_id: &str) -> Option<Account> {
        self.memory.accounts.get(account_id).await.expect("get account")
    }

    pub async fn pending_for_meeting(&self, meeting_id: &str) -> u64 {
        self.memory
            .invitations
            .count_by_meeting(meeting_id)
            .await
            .expect("count invitations")
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seeded_members() {
        let world = TestWorld::new();
        world.account("u1", "alice").await;
        world.meeting("m1", "u1").await;
        world.add_members("m1", &["u2"], &["u3"]).await;

        let meeting = world.stored_meeting("m1").await.unwrap();
        assert!(meeting.organizers.contains("u2"));
        assert!(!meeting.participants.contains("u2"));
        assert!(meeting.participants.contains("u3"));
    }
}
