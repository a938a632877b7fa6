//! In-memory store implementations.
//!
//! Used by service and HTTP tests. Each store carries a [`Faults`] handle
//! that can make named operations fail, make writes touching a given id
//! fail, or delay every call.

use super::{AccountStore, InvitationStore, MeetingStore, Stores};
use crate::errors::HuddleError;
use crate::models::{Account, Invitation, Meeting};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Failure and latency injection shared by the in-memory stores.
#[derive(Default)]
pub struct Faults {
    failing_operations: RwLock<HashSet<&'static str>>,
    failing_ids: RwLock<HashSet<String>>,
    latency: RwLock<Option<Duration>>,
    calls: AtomicUsize,
}

impl Faults {
    /// Make every call of `operation` (e.g. `"update"`, `"delete"`) fail.
    pub async fn fail_operation(&self, operation: &'static str) {
        self.failing_operations.write().await.insert(operation);
    }

    /// Make updates and deletes of the entity with this id fail.
    pub async fn fail_writes_to(&self, id: impl Into<String>) {
        self.failing_ids.write().await.insert(id.into());
    }

    /// Delay every call by `latency`.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = Some(latency);
    }

    pub async fn clear(&self) {
        self.failing_operations.write().await.clear();
        self.failing_ids.write().await.clear();
        *self.latency.write().await = None;
    }

    /// Number of store calls observed so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn check(&self, operation: &'static str, write_id: Option<&str>) -> Result<(), HuddleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing_operations.read().await.contains(operation) {
            return Err(HuddleError::Database(format!(
                "injected failure: {operation}"
            )));
        }

        if let Some(id) = write_id {
            if self.failing_ids.read().await.contains(id) {
                return Err(HuddleError::Database(format!(
                    "injected failure: {operation} {id}"
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<BTreeMap<String, Account>>,
    pub faults: Faults,
}

#[async_trait::async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn create(&self, account: &Account) -> Result<(), HuddleError> {
        self.faults.check("create", None).await?;

        let mut accounts = self.accounts.write().await;
        let name_taken = accounts
            .values()
            .any(|a| a.display_name == account.display_name);
        if accounts.contains_key(&account.id) || name_taken {
            return Err(HuddleError::Conflict(
                "Account or display name already exists".to_string(),
            ));
        }
        accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn get(&self, account_id: &str) -> Result<Option<Account>, HuddleError> {
        self.faults.check("get", None).await?;
        Ok(self.accounts.read().await.get(account_id).cloned())
    }

    async fn get_by_display_name(
        &self,
        display_name: &str,
    ) -> Result<Option<Account>, HuddleError> {
        self.faults.check("get_by_display_name", None).await?;
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.display_name == display_name)
            .cloned())
    }

    async fn update(&self, account: &Account) -> Result<(), HuddleError> {
        self.faults.check("update", Some(&account.id)).await?;

        let mut accounts = self.accounts.write().await;
        let name_taken = accounts
            .values()
            .any(|a| a.id != account.id && a.display_name == account.display_name);
        if name_taken {
            return Err(HuddleError::Conflict(
                "Account or display name already exists".to_string(),
            ));
        }
        match accounts.get_mut(&account.id) {
            Some(existing) => {
                existing.display_name = account.display_name.clone();
                existing.meeting_quota = account.meeting_quota;
                Ok(())
            }
            None => Err(HuddleError::NotFound("Account not found".to_string())),
        }
    }

    async fn delete(&self, account_id: &str) -> Result<bool, HuddleError> {
        self.faults.check("delete", Some(account_id)).await?;
        Ok(self.accounts.write().await.remove(account_id).is_some())
    }
}

// ============================================================================
// Meetings
// ============================================================================

#[derive(Default)]
pub struct InMemoryMeetingStore {
    meetings: RwLock<BTreeMap<String, Meeting>>,
    pub faults: Faults,
}

#[async_trait::async_trait]
impl MeetingStore for InMemoryMeetingStore {
    async fn create(&self, meeting: &Meeting) -> Result<(), HuddleError> {
        self.faults.check("create", None).await?;

        let mut meetings = self.meetings.write().await;
        if meetings.contains_key(&meeting.id) {
            return Err(HuddleError::Conflict("Meeting already exists".to_string()));
        }
        meetings.insert(meeting.id.clone(), meeting.clone());
        Ok(())
    }

    async fn get(&self, meeting_id: &str) -> Result<Option<Meeting>, HuddleError> {
        self.faults.check("get", None).await?;
        Ok(self.meetings.read().await.get(meeting_id).cloned())
    }

    async fn update(&self, meeting: &Meeting) -> Result<bool, HuddleError> {
        self.faults.check("update", Some(&meeting.id)).await?;

        match self.meetings.write().await.get_mut(&meeting.id) {
            Some(existing) if existing.version == meeting.version => {
                existing.name = meeting.name.clone();
                existing.organizers = meeting.organizers.clone();
                existing.participants = meeting.participants.clone();
                existing.invite_quota = meeting.invite_quota;
                existing.version += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for_account(&self, account_id: &str) -> Result<Vec<Meeting>, HuddleError> {
        self.faults.check("list_for_account", None).await?;

        let mut meetings: Vec<Meeting> = self
            .meetings
            .read()
            .await
            .values()
            .filter(|m| m.is_participant(account_id))
            .cloned()
            .collect();
        meetings.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(meetings)
    }

    async fn count_for_account(&self, account_id: &str) -> Result<u64, HuddleError> {
        self.faults.check("count_for_account", None).await?;

        let count = self
            .meetings
            .read()
            .await
            .values()
            .filter(|m| m.is_participant(account_id))
            .count();
        Ok(count as u64)
    }

    async fn delete(&self, meeting_id: &str) -> Result<bool, HuddleError> {
        self.faults.check("delete", Some(meeting_id)).await?;
        Ok(self.meetings.write().await.remove(meeting_id).is_some())
    }
}

// ============================================================================
// Invitations
// ============================================================================

/// In-memory `InvitationStore`.
///
/// The (receiver, meeting) uniqueness check runs under the write lock, so
/// concurrent creates behave like the Postgres unique constraint.
#[derive(Default)]
pub struct InMemoryInvitationStore {
    invitations: RwLock<BTreeMap<String, Invitation>>,
    pub faults: Faults,
}

impl InMemoryInvitationStore {
    async fn filtered(&self, keep: impl Fn(&Invitation) -> bool) -> Vec<Invitation> {
        let mut invitations: Vec<Invitation> = self
            .invitations
            .read()
            .await
            .values()
            .filter(|i| keep(i))
            .cloned()
            .collect();
        invitations.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
        invitations
    }
}

#[async_trait::async_trait]
impl InvitationStore for InMemoryInvitationStore {
    async fn create(&self, invitation: &Invitation) -> Result<(), HuddleError> {
        self.faults.check("create", None).await?;

        let mut invitations = self.invitations.write().await;
        let duplicate_pair = invitations.values().any(|i| {
            i.receiver_id == invitation.receiver_id && i.meeting_id == invitation.meeting_id
        });
        if duplicate_pair || invitations.contains_key(&invitation.id) {
            return Err(HuddleError::Conflict(
                "An invitation for this account and meeting already exists".to_string(),
            ));
        }
        invitations.insert(invitation.id.clone(), invitation.clone());
        Ok(())
    }

    async fn get(&self, invite_id: &str) -> Result<Option<Invitation>, HuddleError> {
        self.faults.check("get", None).await?;
        Ok(self.invitations.read().await.get(invite_id).cloned())
    }

    async fn get_by_receiver_and_meeting(
        &self,
        receiver_id: &str,
        meeting_id: &str,
    ) -> Result<Option<Invitation>, HuddleError> {
        self.faults.check("get_by_receiver_and_meeting", None).await?;
        Ok(self
            .invitations
            .read()
            .await
            .values()
            .find(|i| i.receiver_id == receiver_id && i.meeting_id == meeting_id)
            .cloned())
    }

    async fn list_by_receiver(&self, receiver_id: &str) -> Result<Vec<Invitation>, HuddleError> {
        self.faults.check("list_by_receiver", None).await?;
        Ok(self.filtered(|i| i.receiver_id == receiver_id).await)
    }

    async fn count_by_receiver(&self, receiver_id: &str) -> Result<u64, HuddleError> {
        self.faults.check("count_by_receiver", None).await?;
        Ok(self.filtered(|i| i.receiver_id == receiver_id).await.len() as u64)
    }

    async fn list_by_meeting(&self, meeting_id: &str) -> Result<Vec<Invitation>, HuddleError> {
        self.faults.check("list_by_meeting", None).await?;
        Ok(self.filtered(|i| i.meeting_id == meeting_id).await)
    }

    async fn count_by_meeting(&self, meeting_id: &str) -> Result<u64, HuddleError> {
        self.faults.check("count_by_meeting", None).await?;
        Ok(self.filtered(|i| i.meeting_id == meeting_id).await.len() as u64)
    }

    async fn delete(&self, invite_id: &str) -> Result<bool, HuddleError> {
        self.faults.check("delete", Some(invite_id)).await?;
        Ok(self.invitations.write().await.remove(invite_id).is_some())
    }
}

/// Concrete in-memory stores, kept alongside the trait-object bundle so
/// tests can reach the fault handles.
#[derive(Clone, Default)]
pub struct MemoryStores {
    pub accounts: Arc<InMemoryAccountStore>,
    pub meetings: Arc<InMemoryMeetingStore>,
    pub invitations: Arc<InMemoryInvitationStore>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trait-object view for wiring into services.
    pub fn stores(&self) -> Stores {
        Stores {
            accounts: self.accounts.clone(),
            meetings: self.meetings.clone(),
            invitations: self.invitations.clone(),
        }
    }
}
