// ABOUTME: Grade passback submission to the platform's Assignment and Grade Service
// ABOUTME: Acquires a client-credentials bearer token and posts scores with durable status tracking
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Grade Passback Submitter
//!
//! Posts score updates to a resource link's AGS lineitem URL. Every
//! attempt that passes validation is durably recorded *before* any
//! network activity and finalized to `sent` or `failed` before the call
//! returns — a record is never left `pending`. There is no automatic
//! retry: a failed passback is terminal for that attempt, and a resend is
//! a new call with a new record.

use crate::config::environment::ServerConfig;
use crate::constants::{ags, defaults};
use crate::database::Database;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{GradePassback, GradePassbackStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{error, info};
use uuid::Uuid;

/// Grade submission request body, camelCase on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSubmission {
    pub user_id: Option<String>,
    pub resource_link_id: Option<String>,
    pub score_given: Option<f64>,
    pub score_maximum: Option<f64>,
    pub lineitem_url: Option<String>,
}

/// Submission with every field present and the score inside bounds
#[derive(Debug)]
struct ValidatedSubmission {
    user_id: String,
    resource_link_id: String,
    score_given: f64,
    score_maximum: f64,
    lineitem_url: String,
}

/// Token endpoint response for the client-credentials grant
#[derive(Debug, Deserialize)]
struct TokenGrantResponse {
    access_token: String,
}

/// AGS score payload posted to the lineitem URL
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScorePayload<'a> {
    user_id: &'a str,
    score_given: f64,
    score_maximum: f64,
    activity_progress: &'a str,
    grading_progress: &'a str,
    timestamp: String,
}

/// Submits scores to the platform with at-most-once-per-call semantics
pub struct GradeSubmitter {
    config: Arc<ServerConfig>,
    database: Arc<Database>,
    http: reqwest::Client,
}

impl GradeSubmitter {
    /// Create a submitter with a bounded-timeout HTTP client
    #[must_use]
    pub fn new(config: Arc<ServerConfig>, database: Arc<Database>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(defaults::OUTBOUND_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            config,
            database,
            http,
        }
    }

    /// Submit a score to the platform, returning the passback record id.
    ///
    /// # Errors
    ///
    /// - [`ErrorCode::MissingParameter`] / [`ErrorCode::InvalidScore`]
    ///   before any record or network activity
    /// - [`ErrorCode::CredentialAcquisitionFailed`] when the bearer token
    ///   cannot be obtained (record marked `failed`)
    /// - [`ErrorCode::GradePassbackFailed`] when the score POST is
    ///   rejected (record marked `failed`; upstream detail is logged
    ///   server-side, not returned)
    pub async fn submit_grade(&self, submission: &GradeSubmission) -> AppResult<Uuid> {
        let validated = validate_submission(submission)?;

        // Durable audit row before any network activity
        let passback = GradePassback {
            id: Uuid::new_v4(),
            user_id: validated.user_id.clone(),
            resource_link_id: validated.resource_link_id.clone(),
            score: validated.score_given,
            max_score: validated.score_maximum,
            status: GradePassbackStatus::Pending,
            sent_at: None,
            response_body: None,
            created_at: Utc::now(),
        };
        self.database.create_grade_passback(&passback).await?;

        let access_token = match self.acquire_score_credential().await {
            Ok(token) => token,
            Err(e) => {
                self.finalize_failed(passback.id, &e.message).await;
                return Err(e);
            }
        };

        match self.post_score(&validated, &access_token).await {
            Ok(response_body) => {
                let sent_at = Utc::now();
                self.database
                    .mark_passback_sent(passback.id, sent_at, &response_body)
                    .await?;
                info!(
                    "grade passback {} sent for resource link {}",
                    passback.id, validated.resource_link_id
                );
                Ok(passback.id)
            }
            Err(e) => {
                self.finalize_failed(passback.id, &e.message).await;
                Err(e)
            }
        }
    }

    /// Obtain a bearer token via the client-credentials grant scoped to
    /// score writes
    async fn acquire_score_credential(&self) -> AppResult<String> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.platform.client_id.as_str()),
            ("client_secret", self.config.platform.client_secret.as_str()),
            ("scope", ags::SCORE_SCOPE),
        ];

        let response = self
            .http
            .post(&self.config.platform.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                AppError::new(
                    ErrorCode::CredentialAcquisitionFailed,
                    format!("token endpoint unreachable: {e}"),
                )
                .with_source(e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("token endpoint returned {status}: {body}");
            return Err(AppError::new(
                ErrorCode::CredentialAcquisitionFailed,
                format!("token endpoint returned {status}"),
            ));
        }

        let grant: TokenGrantResponse = response.json().await.map_err(|e| {
            AppError::new(
                ErrorCode::CredentialAcquisitionFailed,
                format!("token endpoint response could not be parsed: {e}"),
            )
            .with_source(e)
        })?;

        Ok(grant.access_token)
    }

    /// POST the score payload to the lineitem URL
    async fn post_score(
        &self,
        submission: &ValidatedSubmission,
        access_token: &str,
    ) -> AppResult<String> {
        let payload = ScorePayload {
            user_id: &submission.user_id,
            score_given: submission.score_given,
            score_maximum: submission.score_maximum,
            activity_progress: ags::ACTIVITY_PROGRESS_COMPLETED,
            grading_progress: ags::GRADING_PROGRESS_FULLY_GRADED,
            timestamp: Utc::now().to_rfc3339(),
        };
        let body = serde_json::to_string(&payload)
            .map_err(|e| AppError::internal(format!("score payload serialization failed: {e}")))?;

        let response = self
            .http
            .post(&submission.lineitem_url)
            .header(http::header::AUTHORIZATION, format!("Bearer {access_token}"))
            .header(http::header::CONTENT_TYPE, ags::SCORE_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                AppError::new(
                    ErrorCode::GradePassbackFailed,
                    format!("score endpoint unreachable: {e}"),
                )
                .with_source(e)
            })?;

        let status = response.status();
        let response_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(
                "score endpoint {} returned {status}: {response_body}",
                submission.lineitem_url
            );
            return Err(AppError::new(
                ErrorCode::GradePassbackFailed,
                format!("score endpoint returned {status}: {response_body}"),
            ));
        }

        Ok(response_body)
    }

    /// Finalize the record as failed. Best-effort: the original error is
    /// what the caller sees even if this write fails.
    async fn finalize_failed(&self, id: Uuid, error_detail: &str) {
        if let Err(e) = self.database.mark_passback_failed(id, error_detail).await {
            error!("failed to record grade passback failure for {id}: {e}");
        }
    }
}

/// Check field presence and score bounds. Runs before any record or
/// network activity, so rejected submissions leave no trace.
fn validate_submission(submission: &GradeSubmission) -> AppResult<ValidatedSubmission> {
    let user_id = require_field(submission.user_id.as_deref(), "userId")?;
    let resource_link_id = require_field(submission.resource_link_id.as_deref(), "resourceLinkId")?;
    let lineitem_url = require_field(submission.lineitem_url.as_deref(), "lineitemUrl")?;
    let score_given = submission
        .score_given
        .ok_or_else(|| AppError::missing_parameter("scoreGiven"))?;
    let score_maximum = submission
        .score_maximum
        .ok_or_else(|| AppError::missing_parameter("scoreMaximum"))?;

    if !(score_given >= 0.0 && score_given <= score_maximum) {
        return Err(AppError::new(
            ErrorCode::InvalidScore,
            format!("scoreGiven {score_given} is outside 0..={score_maximum}"),
        ));
    }

    Ok(ValidatedSubmission {
        user_id: user_id.to_owned(),
        resource_link_id: resource_link_id.to_owned(),
        score_given,
        score_maximum,
        lineitem_url: lineitem_url.to_owned(),
    })
}

fn require_field<'a>(value: Option<&'a str>, name: &str) -> AppResult<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::missing_parameter(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_submission() -> GradeSubmission {
        GradeSubmission {
            user_id: Some("u1".into()),
            resource_link_id: Some("r1".into()),
            score_given: Some(8.0),
            score_maximum: Some(10.0),
            lineitem_url: Some("https://example.test/lineitems/1".into()),
        }
    }

    #[test]
    fn test_validation_accepts_bounds() {
        assert!(validate_submission(&full_submission()).is_ok());

        let mut zero = full_submission();
        zero.score_given = Some(0.0);
        assert!(validate_submission(&zero).is_ok());

        let mut max = full_submission();
        max.score_given = Some(10.0);
        assert!(validate_submission(&max).is_ok());
    }

    #[test]
    fn test_validation_rejects_out_of_bounds() {
        let mut negative = full_submission();
        negative.score_given = Some(-1.0);
        assert_eq!(
            validate_submission(&negative).unwrap_err().code,
            ErrorCode::InvalidScore
        );

        let mut above = full_submission();
        above.score_given = Some(12.0);
        assert_eq!(
            validate_submission(&above).unwrap_err().code,
            ErrorCode::InvalidScore
        );

        let mut nan = full_submission();
        nan.score_given = Some(f64::NAN);
        assert_eq!(
            validate_submission(&nan).unwrap_err().code,
            ErrorCode::InvalidScore
        );
    }

    #[test]
    fn test_validation_rejects_missing_fields() {
        let mut missing = full_submission();
        missing.user_id = None;
        assert_eq!(
            validate_submission(&missing).unwrap_err().code,
            ErrorCode::MissingParameter
        );

        let mut blank = full_submission();
        blank.lineitem_url = Some("  ".into());
        assert_eq!(
            validate_submission(&blank).unwrap_err().code,
            ErrorCode::MissingParameter
        );
    }

    #[test]
    fn test_score_payload_wire_shape() {
        let payload = ScorePayload {
            user_id: "u1",
            score_given: 8.0,
            score_maximum: 10.0,
            activity_progress: ags::ACTIVITY_PROGRESS_COMPLETED,
            grading_progress: ags::GRADING_PROGRESS_FULLY_GRADED,
            timestamp: "2026-01-01T00:00:00+00:00".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["scoreGiven"], 8.0);
        assert_eq!(json["activityProgress"], "Completed");
        assert_eq!(json["gradingProgress"], "FullyGraded");
    }
}
