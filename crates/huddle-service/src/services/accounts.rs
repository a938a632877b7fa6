//! Account service.
//!
//! Registration of identity-provider subjects, profile reads and updates,
//! and the guarded account deletion cascade.

use super::{with_deadline, write_meeting, Deadlines, MeetingWrite};
use crate::errors::HuddleError;
use crate::models::{validate_display_name, Account, AccountDeletion, CascadeReport};
use crate::observability::metrics;
use crate::repositories::Stores;
use chrono::Utc;
use std::time::Instant;
use tracing::instrument;

pub struct AccountService {
    stores: Stores,
    deadlines: Deadlines,
    default_meeting_quota: i32,
}

impl AccountService {
    pub fn new(stores: Stores, deadlines: Deadlines, default_meeting_quota: i32) -> Self {
        Self {
            stores,
            deadlines,
            default_meeting_quota,
        }
    }

    /// Register the caller's identity as an account.
    ///
    /// # Errors
    ///
    /// - `BadRequest` - display name out of bounds
    /// - `Conflict` - account already registered or display name taken
    #[instrument(skip_all, name = "huddle.service.create_account")]
    pub async fn create(&self, caller_id: &str, display_name: &str) -> Result<Account, HuddleError> {
        with_deadline(
            "create_account",
            self.deadlines.operation,
            self.create_inner(caller_id, display_name),
        )
        .await
    }

    async fn create_inner(&self, caller_id: &str, display_name: &str) -> Result<Account, HuddleError> {
        let display_name = validate_display_name(display_name)
            .map_err(|msg| HuddleError::BadRequest(msg.to_string()))?;

        if self.stores.accounts.get(caller_id).await?.is_some() {
            return Err(HuddleError::Conflict(
                "Account already registered".to_string(),
            ));
        }
        if self
            .stores
            .accounts
            .get_by_display_name(display_name)
            .await?
            .is_some()
        {
            return Err(HuddleError::Conflict("Display name is taken".to_string()));
        }

        let account = Account {
            id: caller_id.to_string(),
            display_name: display_name.to_string(),
            meeting_quota: self.default_meeting_quota,
            created_at: Utc::now(),
        };
        self.stores.accounts.create(&account).await?;

        tracing::info!(
            target: "huddle.service.accounts",
            account_id = %account.id,
            "Account registered"
        );

        Ok(account)
    }

    /// Fetch an account. Only the account itself may read it.
    #[instrument(skip_all, name = "huddle.service.get_account")]
    pub async fn get(&self, account_id: &str, caller_id: &str) -> Result<Account, HuddleError> {
        with_deadline("get_account", self.deadlines.operation, async {
            let account = self.require_account(account_id).await?;
            if account.id != caller_id {
                return Err(HuddleError::Forbidden(
                    "Cannot view another account".to_string(),
                ));
            }
            Ok(account)
        })
        .await
    }

    /// Change the caller's display name.
    ///
    /// # Errors
    ///
    /// - `BadRequest` - display name out of bounds
    /// - `NotFound` - caller has no account
    /// - `Conflict` - display name taken by another account
    #[instrument(skip_all, name = "huddle.service.update_account")]
    pub async fn update_display_name(
        &self,
        caller_id: &str,
        display_name: &str,
    ) -> Result<Account, HuddleError> {
        with_deadline("update_account", self.deadlines.operation, async {
            let display_name = validate_display_name(display_name)
                .map_err(|msg| HuddleError::BadRequest(msg.to_string()))?;

            let mut account = self.require_account(caller_id).await?;
            if account.display_name == display_name {
                return Ok(account);
            }

            if let Some(holder) = self
                .stores
                .accounts
                .get_by_display_name(display_name)
                .await?
            {
                if holder.id != account.id {
                    return Err(HuddleError::Conflict("Display name is taken".to_string()));
                }
            }

            account.display_name = display_name.to_string();
            self.stores.accounts.update(&account).await?;
            Ok(account)
        })
        .await
    }

    /// Delete an account.
    ///
    /// Pending invitations addressed to the account are deleted and the
    /// account is removed from every meeting it belongs to. Both loops are
    /// best-effort and report per-item failures. The account record is
    /// deleted last.
    ///
    /// # Errors
    ///
    /// - `Forbidden` - caller is not the account
    /// - `NotFound` - account absent
    /// - `OwnerConflict` - account still owns meetings
    #[instrument(skip_all, name = "huddle.service.delete_account")]
    pub async fn delete(&self, target_id: &str, caller_id: &str) -> Result<AccountDeletion, HuddleError> {
        with_deadline(
            "delete_account",
            self.deadlines.cascade,
            self.delete_inner(target_id, caller_id),
        )
        .await
    }

    async fn delete_inner(
        &self,
        target_id: &str,
        caller_id: &str,
    ) -> Result<AccountDeletion, HuddleError> {
        let start = Instant::now();

        if target_id != caller_id {
            return Err(HuddleError::Forbidden(
                "Cannot delete another account".to_string(),
            ));
        }

        self.require_account(target_id).await?;

        let meetings = self.stores.meetings.list_for_account(target_id).await?;
        let owned = meetings.iter().filter(|m| m.is_owner(target_id)).count();
        if owned > 0 {
            return Err(HuddleError::OwnerConflict(format!(
                "Account owns {owned} meeting(s); delete them first"
            )));
        }

        let mut invites = CascadeReport::default();
        for invitation in self.stores.invitations.list_by_receiver(target_id).await? {
            match self.stores.invitations.delete(&invitation.id).await {
                Ok(_) => invites.record_removed(invitation.id),
                Err(e) => {
                    tracing::warn!(
                        target: "huddle.service.accounts",
                        invite_id = %invitation.id,
                        error = %e,
                        "Failed to delete invitation during account deletion"
                    );
                    invites.record_failure(invitation.id, e.error_type());
                }
            }
        }

        let mut memberships = CascadeReport::default();
        for meeting in meetings {
            let meeting_id = meeting.id.clone();
            let written = write_meeting(&*self.stores.meetings, meeting, |m| {
                Ok(m.remove_member(target_id))
            })
            .await;
            match written {
                Ok(MeetingWrite::Written(_)) => memberships.record_removed(meeting_id),
                Ok(MeetingWrite::Unchanged(_) | MeetingWrite::Gone) => {}
                Err(e) => {
                    tracing::warn!(
                        target: "huddle.service.accounts",
                        meeting_id = %meeting_id,
                        error = %e,
                        "Failed to remove membership during account deletion"
                    );
                    memberships.record_failure(meeting_id, e.error_type());
                }
            }
        }

        self.stores.accounts.delete(target_id).await?;

        let removed = invites.removed.len() + memberships.removed.len();
        let failed = invites.failed.len() + memberships.failed.len();
        metrics::record_cascade("account", removed, failed, start.elapsed());
        tracing::info!(
            target: "huddle.service.accounts",
            account_id = %target_id,
            items_removed = removed,
            items_failed = failed,
            "Account deleted"
        );

        Ok(AccountDeletion {
            account_id: target_id.to_string(),
            invites,
            memberships,
        })
    }

    async fn require_account(&self, account_id: &str) -> Result<Account, HuddleError> {
        self.stores
            .accounts
            .get(account_id)
            .await?
            .ok_or_else(|| HuddleError::NotFound("Account not found".to_string()))
    }
}
