//! Account registration and deletion tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use huddle_service::errors::HuddleError;
use huddle_service::models::{AcceptOutcome, DeleteInviteOutcome};
use huddle_test_utils::{TestWorld, TEST_MEETING_QUOTA};

#[tokio::test]
async fn test_register_then_read_back() {
    let world = TestWorld::new();
    let account = world.services.accounts.create("u1", " alice ").await.unwrap();
    assert_eq!(account.display_name, "alice");
    assert_eq!(account.meeting_quota, TEST_MEETING_QUOTA);

    let fetched = world.services.accounts.get("u1", "u1").await.unwrap();
    assert_eq!(fetched, account);
}

#[tokio::test]
async fn test_owner_must_delete_meetings_first() {
    let world = TestWorld::new();
    world.account("u1", "alice").await;
    world.meeting("m1", "u1").await;
    world.meeting("m2", "u1").await;

    let result = world.services.accounts.delete("u1", "u1").await;
    assert!(
        matches!(&result, Err(HuddleError::OwnerConflict(msg)) if msg.contains('2')),
        "{result:?}"
    );
    assert!(world.stored_account("u1").await.is_some());

    world.services.meetings.delete("m1", "u1").await.unwrap();
    world.services.meetings.delete("m2", "u1").await.unwrap();

    let report = world.services.accounts.delete("u1", "u1").await.unwrap();
    assert_eq!(report.account_id, "u1");
    assert!(world.stored_account("u1").await.is_none());
}

#[tokio::test]
async fn test_delete_account_removes_invites_and_memberships() {
    let world = TestWorld::new();
    world.account("u1", "alice").await;
    world.account("u2", "bob").await;
    world.account("u3", "carol").await;
    world.meeting("m1", "u1").await;
    world.meeting("m2", "u1").await;
    world.meeting("m3", "u3").await;
    world.add_members("m1", &["u2"], &[]).await;
    world.add_members("m2", &[], &["u2"]).await;

    let pending = world.services.invitations.send("m3", "u2", "u3").await.unwrap();
    // Invitation sent by u2 survives the deletion of its sender
    let sent = world.services.invitations.send("m1", "u3", "u2").await.unwrap();

    let report = world.services.accounts.delete("u2", "u2").await.unwrap();
    assert!(report.invites.is_complete());
    assert!(report.memberships.is_complete());
    assert_eq!(report.invites.removed, vec![pending.id.clone()]);

    let mut left = report.memberships.removed.clone();
    left.sort();
    assert_eq!(left, vec!["m1".to_string(), "m2".to_string()]);

    for meeting_id in ["m1", "m2"] {
        let meeting = world.stored_meeting(meeting_id).await.unwrap();
        assert!(!meeting.is_participant("u2"));
        assert_eq!(meeting.member_count(), 1);
    }
    assert!(world.stored_invite(&pending.id).await.is_none());
    assert!(world.stored_account("u2").await.is_none());

    // The invitation sent by u2 is now stale and anyone may clear it
    let outcome = world.services.invitations.delete(&sent.id, "u3").await.unwrap();
    assert!(matches!(outcome, DeleteInviteOutcome::Stale { .. }));
}

#[tokio::test]
async fn test_partial_account_cascade_is_reported() {
    let world = TestWorld::new();
    world.account("u1", "alice").await;
    world.account("u2", "bob").await;
    world.meeting("m1", "u1").await;
    world.meeting("m2", "u1").await;
    world.add_members("m1", &[], &["u2"]).await;

    let invite = world.services.invitations.send("m2", "u2", "u1").await.unwrap();
    world
        .memory
        .invitations
        .faults
        .fail_writes_to(invite.id.clone())
        .await;
    world.memory.meetings.faults.fail_writes_to("m1").await;

    let report = world.services.accounts.delete("u2", "u2").await.unwrap();
    assert_eq!(report.invites.failed.len(), 1);
    assert_eq!(report.invites.failed[0].id, invite.id);
    assert_eq!(report.memberships.failed.len(), 1);
    assert_eq!(report.memberships.failed[0].id, "m1");
    assert_eq!(report.memberships.failed[0].reason, "database");

    // Account record is deleted regardless
    assert!(world.stored_account("u2").await.is_none());

    // The leftover invitation is reaped on access
    world.memory.invitations.faults.clear().await;
    let outcome = world.services.invitations.accept(&invite.id, "u2").await.unwrap();
    assert!(matches!(outcome, AcceptOutcome::Stale { .. }));
    assert!(world.stored_invite(&invite.id).await.is_none());
}

#[tokio::test]
async fn test_cannot_delete_other_account() {
    let world = TestWorld::new();
    world.account("u1", "alice").await;
    world.account("u2", "bob").await;

    assert!(matches!(
        world.services.accounts.delete("u2", "u1").await,
        Err(HuddleError::Forbidden(_))
    ));
    assert!(world.stored_account("u2").await.is_some());
}

#[tokio::test]
async fn test_display_names_stay_unique() {
    let world = TestWorld::new();
    world.services.accounts.create("u1", "alice").await.unwrap();
    world.services.accounts.create("u2", "bob").await.unwrap();

    assert!(matches!(
        world.services.accounts.create("u3", "alice").await,
        Err(HuddleError::Conflict(_))
    ));
    assert!(matches!(
        world.services.accounts.update_display_name("u2", "alice").await,
        Err(HuddleError::Conflict(_))
    ));

    // Name is free again once its holder is gone
    world.services.accounts.delete("u1", "u1").await.unwrap();
    let renamed = world
        .services
        .accounts
        .update_display_name("u2", "alice")
        .await
        .unwrap();
    assert_eq!(renamed.display_name, "alice");
}
