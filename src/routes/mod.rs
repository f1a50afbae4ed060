// ABOUTME: Route module organization for the LTI bridge HTTP endpoints
// ABOUTME: Assembles domain routers with CORS and request tracing layers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright ©2025 Async-IO.org

//! HTTP route modules, one per domain, assembled into the service router

pub mod grades;
pub mod health;
pub mod lti;

use crate::resources::ServerResources;
use axum::Router;
use http::{header, HeaderValue, Method};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Inbound request deadline; outbound calls carry their own tighter
/// timeouts
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Build the complete service router with CORS, timeout, and tracing
/// layers
#[must_use]
pub fn router(resources: Arc<ServerResources>) -> Router {
    let cors = cors_layer(&resources.config.cors_allowed_origins);

    Router::new()
        .merge(health::HealthRoutes::routes())
        .merge(lti::LtiRoutes::routes(resources.clone()))
        .merge(grades::GradeRoutes::routes(resources))
        .layer(cors)
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(TraceLayer::new_for_http())
}

/// CORS restricted to the configured origins; origins that fail header
/// parsing are skipped rather than silently allowing everything
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
