// ABOUTME: Integration tests for the launch session store
// ABOUTME: Validates atomic nonce consumption, TTL expiry, and the periodic sweep
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(missing_docs)]

mod common;

#[tokio::test]
async fn test_take_consumes_the_session() {
    let database = common::create_test_database().await;

    let id = database
        .create_session("nonce-1", "state-1", 10)
        .await
        .unwrap();

    let session = database
        .take_session_by_nonce("nonce-1")
        .await
        .unwrap()
        .expect("session should be live");
    assert_eq!(session.id, id);
    assert_eq!(session.state, "state-1");
    assert!(session.expires_at > session.created_at);

    // Consumed on first take; a replayed nonce sees nothing.
    assert!(database
        .take_session_by_nonce("nonce-1")
        .await
        .unwrap()
        .is_none());
    assert_eq!(database.count_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_nonce_is_absent() {
    let database = common::create_test_database().await;
    assert!(database
        .take_session_by_nonce("never-created")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_expired_session_is_treated_as_absent() {
    let database = common::create_test_database().await;

    // A negative TTL stands in for a session created 11 minutes ago with
    // a 10-minute lifetime.
    database
        .create_session("stale-nonce", "state-x", -1)
        .await
        .unwrap();

    assert!(database
        .take_session_by_nonce("stale-nonce")
        .await
        .unwrap()
        .is_none());

    // The row itself is still there until the sweep reclaims it.
    assert_eq!(database.count_sessions().await.unwrap(), 1);
}

#[tokio::test]
async fn test_sweep_removes_only_expired_sessions() {
    let database = common::create_test_database().await;

    database.create_session("old-1", "s", -5).await.unwrap();
    database.create_session("old-2", "s", -1).await.unwrap();
    database.create_session("live", "s", 10).await.unwrap();

    let swept = database.sweep_expired_sessions().await.unwrap();
    assert_eq!(swept, 2);
    assert_eq!(database.count_sessions().await.unwrap(), 1);

    // The surviving session is still consumable.
    assert!(database
        .take_session_by_nonce("live")
        .await
        .unwrap()
        .is_some());

    // Nothing left to sweep.
    assert_eq!(database.sweep_expired_sessions().await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_nonce_is_rejected() {
    let database = common::create_test_database().await;

    database
        .create_session("same-nonce", "state-1", 10)
        .await
        .unwrap();
    // The unique constraint enforces at most one live session per nonce.
    assert!(database
        .create_session("same-nonce", "state-2", 10)
        .await
        .is_err());
}
