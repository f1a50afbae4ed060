// ABOUTME: LTI protocol route handlers for login initiation, launch callback, and key discovery
// ABOUTME: Accepts GET or POST login initiation and form-posted launches per the LTI 1.3 flow
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright ©2025 Async-IO.org

//! LTI 1.3 HTTP endpoints
//!
//! - `GET|POST /lti/login` - login initiation (the platform may use
//!   either verb), redirecting to the platform authorization endpoint
//! - `POST /lti/launch` - launch callback with `id_token` and `state`
//!   form fields, redirecting to the frontend on success
//! - `GET /.well-known/jwks.json` - public key discovery document
//!
//! Failures never redirect: the platform sees an HTTP error, so a
//! spoofed "logged in" state cannot be produced by a failed launch.

use crate::errors::AppError;
use crate::launch::LoginInitiationParams;
use crate::resources::ServerResources;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use http::header;
use serde::Deserialize;
use std::sync::Arc;

/// LTI protocol routes
pub struct LtiRoutes;

/// Launch callback form fields. Optional at the transport layer so their
/// absence surfaces as taxonomy errors, not framework rejections.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LaunchCallback {
    pub id_token: Option<String>,
    pub state: Option<String>,
}

impl LtiRoutes {
    /// Create all LTI protocol routes
    #[must_use]
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                "/lti/login",
                get(Self::handle_login_get).post(Self::handle_login_post),
            )
            .route("/lti/launch", post(Self::handle_launch))
            .route("/.well-known/jwks.json", get(Self::handle_jwks))
            .with_state(resources)
    }

    /// Login initiation via query string
    async fn handle_login_get(
        State(resources): State<Arc<ServerResources>>,
        Query(params): Query<LoginInitiationParams>,
    ) -> Result<Response, AppError> {
        Self::initiate(&resources, &params).await
    }

    /// Login initiation via form body
    async fn handle_login_post(
        State(resources): State<Arc<ServerResources>>,
        Form(params): Form<LoginInitiationParams>,
    ) -> Result<Response, AppError> {
        Self::initiate(&resources, &params).await
    }

    async fn initiate(
        resources: &Arc<ServerResources>,
        params: &LoginInitiationParams,
    ) -> Result<Response, AppError> {
        let redirect_url = resources.orchestrator.initiate_login(params).await?;
        Ok(Redirect::to(&redirect_url).into_response())
    }

    /// Launch callback posted by the platform
    async fn handle_launch(
        State(resources): State<Arc<ServerResources>>,
        Form(callback): Form<LaunchCallback>,
    ) -> Result<Response, AppError> {
        let completed = resources
            .orchestrator
            .handle_launch(callback.id_token.as_deref(), callback.state.as_deref())
            .await?;
        Ok(Redirect::to(&completed.redirect_url).into_response())
    }

    /// Public key discovery document, cacheable for an hour
    async fn handle_jwks(State(resources): State<Arc<ServerResources>>) -> Response {
        (
            [(header::CACHE_CONTROL, "public, max-age=3600")],
            Json(resources.key_manager.jwks().clone()),
        )
            .into_response()
    }
}
