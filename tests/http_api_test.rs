// ABOUTME: HTTP surface tests exercising the assembled router end to end
// ABOUTME: Validates statuses, redirects, error envelopes, and bearer authentication
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright ©2025 Async-IO.org

#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(missing_docs)]

mod common;

use axum::body::Body;
use http::{header, Request, StatusCode};
use tower::util::ServiceExt;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn login_query() -> String {
    serde_urlencoded::to_string([
        ("iss", "https://partners.classera.com"),
        ("login_hint", "abc"),
        ("target_link_uri", "https://app/launch"),
        ("client_id", "client-abc"),
    ])
    .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let platform = common::spawn_mock_platform(common::MockPlatformOptions::default()).await;
    let resources = common::test_resources(&platform.base_url).await;
    let app = lti_bridge_server::routes::router(resources);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "lti-bridge-server");
}

#[tokio::test]
async fn test_jwks_discovery_document() {
    let platform = common::spawn_mock_platform(common::MockPlatformOptions::default()).await;
    let resources = common::test_resources(&platform.base_url).await;
    let expected_kid = resources.key_manager.kid().to_owned();
    let app = lti_bridge_server::routes::router(resources);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/.well-known/jwks.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=3600"
    );
    let json = body_json(response).await;
    assert_eq!(json["keys"][0]["kid"], expected_kid);
    assert_eq!(json["keys"][0]["alg"], "RS256");
    assert_eq!(json["keys"][0]["use"], "sig");
}

#[tokio::test]
async fn test_login_get_redirects_with_nonce_and_state() {
    let platform = common::spawn_mock_platform(common::MockPlatformOptions::default()).await;
    let resources = common::test_resources(&platform.base_url).await;
    let app = lti_bridge_server::routes::router(resources);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/lti/login?{}", login_query()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    let query: std::collections::HashMap<String, String> =
        serde_urlencoded::from_str(url::Url::parse(location).unwrap().query().unwrap()).unwrap();
    assert!(query.contains_key("nonce"));
    assert!(query.contains_key("state"));
    assert_eq!(query["scope"], "openid");
}

#[tokio::test]
async fn test_login_post_form_is_accepted() {
    let platform = common::spawn_mock_platform(common::MockPlatformOptions::default()).await;
    let resources = common::test_resources(&platform.base_url).await;
    let app = lti_bridge_server::routes::router(resources);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/lti/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(login_query()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_redirection());
}

#[tokio::test]
async fn test_login_missing_parameter_is_bad_request() {
    let platform = common::spawn_mock_platform(common::MockPlatformOptions::default()).await;
    let resources = common::test_resources(&platform.base_url).await;
    let app = lti_bridge_server::routes::router(resources);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/lti/login?iss=https%3A%2F%2Fpartners.classera.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "MISSING_PARAMETER");
}

#[tokio::test]
async fn test_launch_with_garbage_token_is_unauthorized() {
    let platform = common::spawn_mock_platform(common::MockPlatformOptions::default()).await;
    let resources = common::test_resources(&platform.base_url).await;
    let app = lti_bridge_server::routes::router(resources);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/lti/launch")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("id_token=not-a-jwt&state=s"))
                .unwrap(),
        )
        .await
        .unwrap();

    // Failures never redirect.
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "MALFORMED_TOKEN");
}

#[tokio::test]
async fn test_grades_require_bearer_token() {
    let platform = common::spawn_mock_platform(common::MockPlatformOptions::default()).await;
    let resources = common::test_resources(&platform.base_url).await;
    let app = lti_bridge_server::routes::router(resources);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/grades")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "AUTH_REQUIRED");
}

#[tokio::test]
async fn test_grades_reject_student_tokens() {
    let platform = common::spawn_mock_platform(common::MockPlatformOptions::default()).await;
    let resources = common::test_resources(&platform.base_url).await;
    let token = resources
        .key_manager
        .issue_app_token("u1", "student", true)
        .unwrap();
    let app = lti_bridge_server::routes::router(resources);

    let body = serde_json::json!({
        "userId": "u1",
        "resourceLinkId": "r1",
        "scoreGiven": 5.0,
        "scoreMaximum": 10.0,
        "lineitemUrl": platform.lineitem_url()
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/grades")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(platform.score_request_count(), 0);
}

#[tokio::test]
async fn test_grade_rejection_scenario() {
    let platform = common::spawn_mock_platform(common::MockPlatformOptions::default()).await;
    let resources = common::test_resources(&platform.base_url).await;
    let token = resources
        .key_manager
        .issue_app_token("u1", "teacher", true)
        .unwrap();
    let app = lti_bridge_server::routes::router(resources);

    let body = serde_json::json!({
        "userId": "u1",
        "resourceLinkId": "r1",
        "scoreGiven": 12,
        "scoreMaximum": 10,
        "lineitemUrl": "https://x"
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/grades")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INVALID_SCORE");
}

#[tokio::test]
async fn test_grade_submission_via_http() {
    let platform = common::spawn_mock_platform(common::MockPlatformOptions::default()).await;
    let resources = common::test_resources(&platform.base_url).await;
    let token = resources
        .key_manager
        .issue_app_token("u1", "teacher", true)
        .unwrap();
    let app = lti_bridge_server::routes::router(resources);

    let body = serde_json::json!({
        "userId": "u1",
        "resourceLinkId": "r1",
        "scoreGiven": 9.0,
        "scoreMaximum": 10.0,
        "lineitemUrl": platform.lineitem_url()
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/grades")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert!(!json["gradeId"].as_str().unwrap().is_empty());
    assert_eq!(platform.score_request_count(), 1);
}
