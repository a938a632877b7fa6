//! End-to-end HTTP tests against the real router over in-memory stores.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use huddle_test_utils::TestHuddleServer;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

async fn create_meeting(
    server: &TestHuddleServer,
    token: &str,
    name: &str,
    participants: &[&str],
) -> Result<Value, anyhow::Error> {
    let response = server
        .client()
        .post(format!("{}/api/v1/meetings", server.url()))
        .bearer_auth(token)
        .json(&json!({ "name": name, "participants": participants }))
        .send()
        .await?;
    anyhow::ensure!(
        response.status() == StatusCode::CREATED,
        "create meeting failed with {}",
        response.status()
    );
    Ok(response.json().await?)
}

async fn send_invite(
    server: &TestHuddleServer,
    token: &str,
    meeting_id: &str,
    receiver_id: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(format!("{}/api/v1/invites", server.url()))
        .bearer_auth(token)
        .json(&json!({ "meeting_id": meeting_id, "receiver_id": receiver_id }))
        .send()
        .await?)
}

async fn get_json(
    server: &TestHuddleServer,
    token: &str,
    path: &str,
) -> Result<(StatusCode, Value), anyhow::Error> {
    let response = server
        .client()
        .get(format!("{}{}", server.url(), path))
        .bearer_auth(token)
        .send()
        .await?;
    let status = response.status();
    Ok((status, response.json().await?))
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn().await?;

    let response = server
        .client()
        .get(format!("{}/api/v1/accounts/@me", server.url()))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let challenge = response
        .headers()
        .get("www-authenticate")
        .expect("challenge header")
        .to_str()?;
    assert!(challenge.contains("realm=\"huddle-api\""));

    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    Ok(())
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn().await?;

    let (status, body) = get_json(&server, "not-a-token", "/api/v1/accounts/@me").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    Ok(())
}

#[tokio::test]
async fn test_unregistered_identity_is_not_found() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn().await?;
    let token = server.issue_token("u-nobody");

    let (status, body) = get_json(&server, &token, "/api/v1/accounts/@me").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn().await?;
    let token = server.register("u-alice", "alice").await?;

    let response = server
        .client()
        .post(format!("{}/api/v1/accounts", server.url()))
        .bearer_auth(&token)
        .json(&json!({ "display_name": "alice-again" }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn test_invitation_flow() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn().await?;
    let alice = server.register("u-alice", "alice").await?;
    let bob = server.register("u-bob", "bob").await?;
    let carol = server.register("u-carol", "carol").await?;

    let created = create_meeting(&server, &alice, "Planning", &["u-bob", "u-carol"]).await?;
    let meeting_id = created["meeting"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["invites"].as_array().unwrap().len(), 2);
    assert_eq!(created["skipped"], json!([]));

    let (status, body) = get_json(
        &server,
        &alice,
        &format!("/api/v1/meetings/{meeting_id}/invites/count"),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    // Bob sees his invitation and accepts it
    let (_, invites) = get_json(&server, &bob, "/api/v1/accounts/@me/invites").await?;
    let invites = invites.as_array().unwrap();
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0]["meeting_id"], meeting_id.as_str());
    let bob_invite = invites[0]["id"].as_str().unwrap().to_string();

    let response = server
        .client()
        .post(format!("{}/api/v1/invites/{bob_invite}/accept", server.url()))
        .bearer_auth(&bob)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome: Value = response.json().await?;
    assert_eq!(outcome, json!({ "outcome": "joined" }));

    let (_, count) = get_json(&server, &bob, "/api/v1/accounts/@me/meetings/count").await?;
    assert_eq!(count["count"], 1);
    let (status, meeting) = get_json(&server, &bob, &format!("/api/v1/meetings/{meeting_id}")).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meeting["participants"], json!(["u-bob"]));

    // Carol rejects hers
    let (_, invites) = get_json(&server, &carol, "/api/v1/accounts/@me/invites").await?;
    let carol_invite = invites[0]["id"].as_str().unwrap().to_string();
    let response = server
        .client()
        .delete(format!("{}/api/v1/invites/{carol_invite}", server.url()))
        .bearer_auth(&carol)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let outcome: Value = response.json().await?;
    assert_eq!(outcome, json!({ "outcome": "removed" }));

    let (_, count) = get_json(&server, &carol, "/api/v1/accounts/@me/invites/count").await?;
    assert_eq!(count["count"], 0);

    // Carol is not a member and cannot see the meeting
    let (status, body) = get_json(&server, &carol, &format!("/api/v1/meetings/{meeting_id}")).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    Ok(())
}

#[tokio::test]
async fn test_duplicate_invite_conflicts() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn().await?;
    let alice = server.register("u-alice", "alice").await?;
    server.register("u-bob", "bob").await?;

    let created = create_meeting(&server, &alice, "Retro", &[]).await?;
    let meeting_id = created["meeting"]["id"].as_str().unwrap();

    let first = send_invite(&server, &alice, meeting_id, "u-bob").await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = send_invite(&server, &alice, meeting_id, "u-bob").await?;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body: Value = second.json().await?;
    assert_eq!(body["error"]["code"], "CONFLICT");
    Ok(())
}

#[tokio::test]
async fn test_invite_quota_is_reported() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn_with_vars(&[("DEFAULT_INVITE_QUOTA", "2")]).await?;
    let alice = server.register("u-alice", "alice").await?;
    server.register("u-bob", "bob").await?;
    server.register("u-carol", "carol").await?;
    server.register("u-dave", "dave").await?;

    let created = create_meeting(&server, &alice, "Small", &[]).await?;
    let meeting_id = created["meeting"]["id"].as_str().unwrap();

    for receiver in ["u-bob", "u-carol"] {
        let response = send_invite(&server, &alice, meeting_id, receiver).await?;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = send_invite(&server, &alice, meeting_id, "u-dave").await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "QUOTA_EXCEEDED");
    Ok(())
}

#[tokio::test]
async fn test_malformed_bodies_are_bad_requests() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn().await?;
    let alice = server.register("u-alice", "alice").await?;

    let cases = [
        ("/api/v1/meetings", "{not json".to_string()),
        ("/api/v1/meetings", json!({ "name": "   " }).to_string()),
        ("/api/v1/meetings", json!({ "name": "x", "extra": 1 }).to_string()),
        ("/api/v1/invites", json!({ "meeting_id": "m" }).to_string()),
    ];

    for (path, body) in cases {
        let response = server
            .client()
            .post(format!("{}{}", server.url(), path))
            .bearer_auth(&alice)
            .header("content-type", "application/json")
            .body(body.clone())
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path} {body}");
        let json: Value = response.json().await?;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
    }
    Ok(())
}

#[tokio::test]
async fn test_owner_cannot_delete_account() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn().await?;
    let alice = server.register("u-alice", "alice").await?;
    let created = create_meeting(&server, &alice, "Mine", &[]).await?;
    let meeting_id = created["meeting"]["id"].as_str().unwrap();

    let response = server
        .client()
        .delete(format!("{}/api/v1/accounts/@me", server.url()))
        .bearer_auth(&alice)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await?;
    assert_eq!(body["error"]["code"], "OWNER_CONFLICT");

    let response = server
        .client()
        .delete(format!("{}/api/v1/meetings/{meeting_id}", server.url()))
        .bearer_auth(&alice)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .client()
        .delete(format!("{}/api/v1/accounts/@me", server.url()))
        .bearer_auth(&alice)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await?;
    assert_eq!(report["account_id"], "u-alice");

    // Token still verifies but no account stands behind it
    let (status, _) = get_json(&server, &alice, "/api/v1/accounts/@me").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_organizer_routes() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn().await?;
    let alice = server.register("u-alice", "alice").await?;
    let bob = server.register("u-bob", "bob").await?;
    server.register("u-carol", "carol").await?;

    let created = create_meeting(&server, &alice, "Board", &["u-bob"]).await?;
    let meeting_id = created["meeting"]["id"].as_str().unwrap().to_string();
    let invite_id = created["invites"][0]["id"].as_str().unwrap().to_string();

    server
        .client()
        .post(format!("{}/api/v1/invites/{invite_id}/accept", server.url()))
        .bearer_auth(&bob)
        .send()
        .await?;

    // Participants cannot invite
    let response = send_invite(&server, &bob, &meeting_id, "u-carol").await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let organizer_url = format!(
        "{}/api/v1/meetings/{meeting_id}/organizers/u-bob",
        server.url()
    );
    let response = server
        .client()
        .put(&organizer_url)
        .bearer_auth(&alice)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let meeting: Value = response.json().await?;
    assert_eq!(meeting["organizers"], json!(["u-bob"]));

    let response = send_invite(&server, &bob, &meeting_id, "u-carol").await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = server
        .client()
        .delete(&organizer_url)
        .bearer_auth(&alice)
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let meeting: Value = response.json().await?;
    assert_eq!(meeting["organizers"], json!([]));
    assert_eq!(meeting["participants"], json!(["u-bob"]));
    Ok(())
}

#[tokio::test]
async fn test_public_endpoints() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn().await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "ready");

    // Generate some traffic first so the exporter has something to render
    reqwest::get(format!("{}/health", server.url())).await?;
    let response = reqwest::get(format!("{}/metrics", server.url())).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_slow_store_returns_gateway_timeout() -> Result<(), anyhow::Error> {
    let server = TestHuddleServer::spawn_with_vars(&[("OPERATION_TIMEOUT_SECONDS", "1")]).await?;
    let alice = server.register("u-alice", "alice").await?;
    let created = create_meeting(&server, &alice, "Slow", &[]).await?;
    let meeting_id = created["meeting"]["id"].as_str().unwrap();

    server
        .memory()
        .meetings
        .faults
        .set_latency(Duration::from_millis(1500))
        .await;

    let (status, body) = get_json(&server, &alice, &format!("/api/v1/meetings/{meeting_id}")).await?;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["code"], "DEADLINE_EXCEEDED");
    Ok(())
}
