// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: Provides database, key, configuration, and mock-platform helpers
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org
#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

//! Shared test utilities for `lti_bridge_server`
//!
//! Key generation is expensive, so one tool key and one simulated
//! platform key are generated per test process and exported as PEM;
//! individual tests bootstrap managers from those PEMs.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use lti_bridge_server::{
    config::environment::{Environment, PlatformConfig, ServerConfig},
    crypto::{KeyManager, RsaKeyPair},
    database::Database,
    resources::ServerResources,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once, OnceLock};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// PEM for the tool's signing key, generated once per test process
pub fn tool_key_pem() -> &'static str {
    static PEM: OnceLock<String> = OnceLock::new();
    PEM.get_or_init(|| {
        RsaKeyPair::generate_with_key_size("test-tool-key", 2048)
            .unwrap()
            .export_private_key_pem()
            .unwrap()
    })
}

/// PEM for the simulated platform's signing key
pub fn platform_key_pem() -> &'static str {
    static PEM: OnceLock<String> = OnceLock::new();
    PEM.get_or_init(|| {
        RsaKeyPair::generate_with_key_size("test-platform-key", 2048)
            .unwrap()
            .export_private_key_pem()
            .unwrap()
    })
}

/// Key manager holding the tool key
pub fn tool_key_manager() -> KeyManager {
    KeyManager::bootstrap(Some(tool_key_pem())).unwrap()
}

/// Key manager standing in for the platform's signing infrastructure
pub fn platform_key_manager() -> KeyManager {
    KeyManager::bootstrap(Some(platform_key_pem())).unwrap()
}

/// The simulated platform's published JWKS document
pub fn platform_jwks_json() -> serde_json::Value {
    serde_json::to_value(platform_key_manager().jwks()).unwrap()
}

/// Sign launch claims the way the platform would
pub fn sign_platform_token(claims: &serde_json::Value) -> String {
    platform_key_manager().sign(claims).unwrap()
}

/// Standard test configuration pointing platform endpoints at a mock
pub fn test_config(platform_base: &str) -> ServerConfig {
    ServerConfig {
        http_port: 0,
        database_url: "sqlite::memory:".into(),
        frontend_url: "http://localhost:3000".into(),
        environment: Environment::Development,
        platform: PlatformConfig {
            issuer: "https://partners.classera.com".into(),
            client_id: "client-abc".into(),
            auth_url: format!("{platform_base}/lti/authorize"),
            token_url: format!("{platform_base}/lti/token"),
            jwks_url: format!("{platform_base}/lti/jwks"),
            client_secret: "test-secret".into(),
        },
        signing_key_pem: None,
        session_ttl_minutes: 10,
        cors_allowed_origins: vec!["http://localhost:3000".into()],
    }
}

/// Standard test database setup
pub async fn create_test_database() -> Arc<Database> {
    init_test_logging();
    Arc::new(Database::new("sqlite::memory:").await.unwrap())
}

/// Fully wired server resources against a mock platform base URL
pub async fn test_resources(platform_base: &str) -> Arc<ServerResources> {
    init_test_logging();
    let config = test_config(platform_base);
    let database = Database::new("sqlite::memory:").await.unwrap();
    Arc::new(ServerResources::new(config, database, tool_key_manager()))
}

/// A launch claim set that passes every orchestrator check, ready for
/// per-test adjustment
pub fn base_launch_claims(nonce: &str) -> serde_json::Value {
    let exp = chrono::Utc::now().timestamp() + 600;
    serde_json::json!({
        "iss": "https://partners.classera.com",
        "sub": "user-42",
        "aud": "client-abc",
        "exp": exp,
        "iat": exp - 600,
        "nonce": nonce,
        "name": "Dana Haddad",
        "given_name": "Dana",
        "family_name": "Haddad",
        "email": "dana@example.test",
        "https://purl.imsglobal.org/spec/lti/claim/message_type": "LtiResourceLinkRequest",
        "https://purl.imsglobal.org/spec/lti/claim/version": "1.3.0",
        "https://purl.imsglobal.org/spec/lti/claim/roles": ["Instructor"],
        "https://purl.imsglobal.org/spec/lti/claim/context": {
            "id": "ctx-7",
            "title": "Science Fair",
            "label": "SCI-7"
        },
        "https://purl.imsglobal.org/spec/lti/claim/resource_link": {
            "id": "rl-3",
            "title": "Volcano Project",
            "description": "Build and document a working model"
        },
        "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint": {
            "lineitem": "https://partners.classera.com/ags/lineitems/3",
            "scope": ["https://purl.imsglobal.org/spec/lti-ags/scope/score"]
        },
        "https://purl.imsglobal.org/spec/lti/claim/custom": {
            "user_id": "u-900",
            "course_id": "c-55"
        }
    })
}

/// Behavior knobs for the mock platform
#[derive(Clone, Copy)]
pub struct MockPlatformOptions {
    pub token_status: u16,
    pub score_status: u16,
}

impl Default for MockPlatformOptions {
    fn default() -> Self {
        Self {
            token_status: 200,
            score_status: 200,
        }
    }
}

struct MockPlatformState {
    jwks: serde_json::Value,
    options: MockPlatformOptions,
    token_requests: Arc<AtomicUsize>,
    score_requests: Arc<AtomicUsize>,
}

/// A live in-process stand-in for the Classera platform: JWKS document,
/// client-credentials token endpoint, and an AGS lineitem endpoint
pub struct MockPlatform {
    pub base_url: String,
    pub token_requests: Arc<AtomicUsize>,
    pub score_requests: Arc<AtomicUsize>,
}

impl MockPlatform {
    pub fn lineitem_url(&self) -> String {
        format!("{}/ags/lineitem", self.base_url)
    }

    pub fn token_request_count(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn score_request_count(&self) -> usize {
        self.score_requests.load(Ordering::SeqCst)
    }
}

/// Spawn a mock platform on an ephemeral port
pub async fn spawn_mock_platform(options: MockPlatformOptions) -> MockPlatform {
    let token_requests = Arc::new(AtomicUsize::new(0));
    let score_requests = Arc::new(AtomicUsize::new(0));

    let state = Arc::new(MockPlatformState {
        jwks: platform_jwks_json(),
        options,
        token_requests: token_requests.clone(),
        score_requests: score_requests.clone(),
    });

    async fn jwks_handler(State(state): State<Arc<MockPlatformState>>) -> Json<serde_json::Value> {
        Json(state.jwks.clone())
    }

    async fn token_handler(
        State(state): State<Arc<MockPlatformState>>,
    ) -> axum::response::Response {
        state.token_requests.fetch_add(1, Ordering::SeqCst);
        let status = StatusCode::from_u16(state.options.token_status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_success() {
            (
                status,
                Json(serde_json::json!({
                    "access_token": "mock-access-token",
                    "token_type": "Bearer",
                    "expires_in": 3600
                })),
            )
                .into_response()
        } else {
            (status, "credential grant denied").into_response()
        }
    }

    async fn score_handler(
        State(state): State<Arc<MockPlatformState>>,
    ) -> axum::response::Response {
        state.score_requests.fetch_add(1, Ordering::SeqCst);
        let status = StatusCode::from_u16(state.options.score_status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_success() {
            (status, r#"{"resultUrl":"https://platform.test/results/1"}"#).into_response()
        } else {
            (status, "lineitem rejected the score").into_response()
        }
    }

    let app = Router::new()
        .route("/lti/jwks", get(jwks_handler))
        .route("/lti/token", post(token_handler))
        .route("/ags/lineitem", post(score_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockPlatform {
        base_url: format!("http://{addr}"),
        token_requests,
        score_requests,
    }
}
