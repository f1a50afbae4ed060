// ABOUTME: Grade submission route handler with bearer app-token authentication
// ABOUTME: Validates the caller's role before delegating to the grade passback submitter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright ©2025 Async-IO.org

//! Grade submission endpoint
//!
//! `POST /api/grades` accepts `{userId, resourceLinkId, scoreGiven,
//! scoreMaximum, lineitemUrl}` from an authenticated caller holding an
//! application token with the teacher or admin role.

use crate::crypto::AppTokenClaims;
use crate::errors::{AppError, ErrorCode};
use crate::grades::GradeSubmission;
use crate::resources::ServerResources;
use axum::{extract::State, routing::post, Json, Router};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Grade submission routes
pub struct GradeRoutes;

/// Response returned after a successful submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSubmissionResponse {
    pub success: bool,
    pub grade_id: String,
    pub message: String,
}

impl GradeRoutes {
    /// Create all grade submission routes
    #[must_use]
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/grades", post(Self::handle_submit))
            .with_state(resources)
    }

    /// Extract and verify the bearer application token, requiring a
    /// grading-capable role on an enabled identity
    fn authenticate(
        headers: &HeaderMap,
        resources: &Arc<ServerResources>,
    ) -> Result<AppTokenClaims, AppError> {
        let auth_header = headers
            .get(http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::new(ErrorCode::AuthRequired, "missing authorization header")
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::auth_invalid("authorization header is not a bearer token"))?;

        let claims = resources.key_manager.verify_app_token(token)?;

        if !claims.integration_enabled {
            return Err(AppError::auth_invalid("integration is disabled for this user"));
        }
        if claims.role != "teacher" && claims.role != "admin" {
            return Err(AppError::auth_invalid(format!(
                "role {} may not submit grades",
                claims.role
            )));
        }

        Ok(claims)
    }

    /// Handle a grade submission
    async fn handle_submit(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(submission): Json<GradeSubmission>,
    ) -> Result<Json<GradeSubmissionResponse>, AppError> {
        Self::authenticate(&headers, &resources)?;

        let grade_id = resources.submitter.submit_grade(&submission).await?;

        Ok(Json(GradeSubmissionResponse {
            success: true,
            grade_id: grade_id.to_string(),
            message: "grade submitted".to_owned(),
        }))
    }
}
