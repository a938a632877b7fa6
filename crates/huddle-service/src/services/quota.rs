//! Quota checks.
//!
//! Pure comparisons of current counts against account and meeting limits.

use crate::errors::HuddleError;
use crate::models::{Account, Meeting};
use crate::observability::metrics;

fn limit(quota: i32) -> u64 {
    u64::try_from(quota).unwrap_or(0)
}

/// Reject meeting creation when `current + 1` exceeds the account's quota.
///
/// `current` counts meetings the account owns, organizes or participates in.
pub fn check_meeting_quota(current: u64, account: &Account) -> Result<(), HuddleError> {
    if current.saturating_add(1) > limit(account.meeting_quota) {
        tracing::debug!(
            target: "huddle.service.quota",
            current = current,
            quota = account.meeting_quota,
            "Meeting quota exceeded"
        );
        metrics::record_quota_rejection("meeting");
        return Err(HuddleError::QuotaExceeded(format!(
            "Meeting limit of {} reached",
            account.meeting_quota
        )));
    }
    Ok(())
}

/// Reject a new invitation when `pending + 1` exceeds the meeting's quota.
pub fn check_invite_quota(pending: u64, meeting: &Meeting) -> Result<(), HuddleError> {
    if pending.saturating_add(1) > limit(meeting.invite_quota) {
        tracing::debug!(
            target: "huddle.service.quota",
            pending = pending,
            quota = meeting.invite_quota,
            "Invite quota exceeded"
        );
        metrics::record_quota_rejection("invite");
        return Err(HuddleError::QuotaExceeded(format!(
            "Invitation limit of {} reached for this meeting",
            meeting.invite_quota
        )));
    }
    Ok(())
}

/// Cut an oversized initial participant list instead of failing creation.
///
/// Lists longer than `invite_quota` keep their first `invite_quota - 1`
/// entries. Lists within quota are returned unchanged.
pub fn truncate_initial_invites(mut participants: Vec<String>, invite_quota: i32) -> Vec<String> {
    let quota = usize::try_from(invite_quota).unwrap_or(0);
    if participants.len() > quota {
        participants.truncate(quota.saturating_sub(1));
    }
    participants
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account(quota: i32) -> Account {
        Account {
            id: "u1".to_string(),
            display_name: "alice".to_string(),
            meeting_quota: quota,
            created_at: Utc::now(),
        }
    }

    fn meeting(quota: i32) -> Meeting {
        Meeting::new("m1".into(), "x".into(), "u1".into(), quota, Utc::now())
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("u{i}")).collect()
    }

    #[test]
    fn test_meeting_quota_boundary() {
        let a = account(5);
        assert!(check_meeting_quota(0, &a).is_ok());
        assert!(check_meeting_quota(4, &a).is_ok());
        assert!(matches!(
            check_meeting_quota(5, &a),
            Err(HuddleError::QuotaExceeded(_))
        ));
        assert!(check_meeting_quota(6, &a).is_err());
    }

    #[test]
    fn test_zero_meeting_quota_rejects_everything() {
        assert!(check_meeting_quota(0, &account(0)).is_err());
    }

    #[test]
    fn test_negative_quota_treated_as_zero() {
        assert!(check_meeting_quota(0, &account(-3)).is_err());
    }

    #[test]
    fn test_invite_quota_boundary() {
        let m = meeting(2);
        assert!(check_invite_quota(0, &m).is_ok());
        assert!(check_invite_quota(1, &m).is_ok());
        assert!(matches!(
            check_invite_quota(2, &m),
            Err(HuddleError::QuotaExceeded(_))
        ));
    }

    #[test]
    fn test_truncate_within_quota_is_unchanged() {
        assert_eq!(truncate_initial_invites(ids(3), 10).len(), 3);
        assert_eq!(truncate_initial_invites(ids(10), 10).len(), 10);
        assert!(truncate_initial_invites(Vec::new(), 10).is_empty());
    }

    #[test]
    fn test_truncate_oversized_list_keeps_quota_minus_one() {
        let truncated = truncate_initial_invites(ids(11), 10);
        assert_eq!(truncated, ids(9));
    }

    #[test]
    fn test_truncate_with_zero_quota() {
        assert!(truncate_initial_invites(ids(3), 0).is_empty());
    }
}
