// ABOUTME: Core data models for the LTI bridge server
// ABOUTME: Defines launch sessions, identities, contexts, grade passbacks and typed launch claims
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright ©2025 Async-IO.org

//! # Data Models
//!
//! Domain entities persisted by the store, plus the strongly typed claim
//! set decoded from inbound launch tokens. Platform-supplied payloads are
//! converted into these types exactly once at the system boundary; nothing
//! downstream handles an open-ended bag of properties.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Internal role resolved from the platform's role vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LtiRole {
    Student,
    Teacher,
    Admin,
}

impl LtiRole {
    /// Stable string form used in tokens and storage
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }

    /// Parse the stable string form, defaulting unknown values to student
    #[must_use]
    pub fn from_str_or_student(s: &str) -> Self {
        match s {
            "teacher" => Self::Teacher,
            "admin" => Self::Admin,
            _ => Self::Student,
        }
    }
}

impl fmt::Display for LtiRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short-lived login session binding a nonce/state pair to one launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSession {
    pub id: Uuid,
    /// Single-use random token carried through the platform round-trip
    pub nonce: String,
    /// CSRF token returned by the platform with the launch
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A platform user provisioned on first launch and refreshed on every
/// subsequent one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: Uuid,
    /// The platform's stable subject identifier (token `sub`)
    pub lti_user_id: String,
    /// Platform-internal user id when supplied via custom claims
    pub platform_user_id: Option<String>,
    pub name: String,
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub role: LtiRole,
    /// Whether this identity is permitted to use the integration
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An external course/classroom, upserted by external context id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseContext {
    pub context_id: String,
    pub title: Option<String>,
    pub label: Option<String>,
    pub course_id: Option<String>,
    /// Issuer identifier of the owning platform
    pub platform: String,
}

/// A specific assignable activity, upserted by external resource-link id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLink {
    pub resource_link_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Owning context id, or the sentinel when launched without context
    pub context_id: String,
    /// AGS lineitem URL scores are posted to; refreshed from every launch
    /// since the platform may rotate it
    pub score_endpoint_url: Option<String>,
}

/// Outcome of one launch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchOutcome {
    Success,
    Failure,
}

impl LaunchOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Append-only audit record, written exactly once per launch attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchRecord {
    pub id: Uuid,
    pub user_id: String,
    pub context_id: String,
    pub resource_link_id: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: LaunchOutcome,
    pub error_message: Option<String>,
}

/// Lifecycle state of one grade submission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradePassbackStatus {
    Pending,
    Sent,
    Failed,
}

impl GradePassbackStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Parse the stored string form
    #[must_use]
    pub fn from_str_or_failed(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "sent" => Self::Sent,
            _ => Self::Failed,
        }
    }
}

/// Durable record of one outbound score submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradePassback {
    pub id: Uuid,
    pub user_id: String,
    pub resource_link_id: String,
    pub score: f64,
    pub max_score: f64,
    pub status: GradePassbackStatus,
    pub sent_at: Option<DateTime<Utc>>,
    /// Raw platform response body on success, error detail on failure
    pub response_body: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Token audience claim; platforms serialize this as either a single
/// string or an array
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Many(Vec<String>),
}

impl Audience {
    /// Whether the audience names the given client id
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::Single(aud) => aud == client_id,
            Self::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// Course context claim carried in a launch token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextClaim {
    pub id: String,
    pub title: Option<String>,
    pub label: Option<String>,
}

/// Resource link claim carried in a launch token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLinkClaim {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// AGS endpoint claim carried in a launch token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgsEndpointClaim {
    /// Gradebook column URL scores for this resource link are posted to
    pub lineitem: Option<String>,
    pub lineitems: Option<String>,
    #[serde(default)]
    pub scope: Vec<String>,
}

/// The full claim set of a verified launch token, decoded once at the
/// boundary. Every platform-supplied field is optional except the
/// registered JWT claims the verifier already enforced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Audience,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub nonce: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,

    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti/claim/message_type"
    )]
    pub message_type: Option<String>,
    #[serde(default, rename = "https://purl.imsglobal.org/spec/lti/claim/version")]
    pub version: Option<String>,
    #[serde(default, rename = "https://purl.imsglobal.org/spec/lti/claim/roles")]
    pub roles: Vec<String>,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id"
    )]
    pub deployment_id: Option<String>,
    #[serde(default, rename = "https://purl.imsglobal.org/spec/lti/claim/context")]
    pub context: Option<ContextClaim>,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti/claim/resource_link"
    )]
    pub resource_link: Option<ResourceLinkClaim>,
    #[serde(
        default,
        rename = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint"
    )]
    pub endpoint: Option<AgsEndpointClaim>,
    #[serde(default, rename = "https://purl.imsglobal.org/spec/lti/claim/custom")]
    pub custom: Option<HashMap<String, serde_json::Value>>,
}

impl LaunchClaims {
    /// Platform-internal user id from custom claims, when present
    #[must_use]
    pub fn platform_user_id(&self) -> Option<String> {
        self.custom
            .as_ref()
            .and_then(|custom| custom.get("user_id"))
            .and_then(|value| value.as_str())
            .map(ToOwned::to_owned)
    }

    /// Platform-internal course id from custom claims, when present
    #[must_use]
    pub fn course_id(&self) -> Option<String> {
        self.custom
            .as_ref()
            .and_then(|custom| custom.get("course_id"))
            .and_then(|value| value.as_str())
            .map(ToOwned::to_owned)
    }
}
