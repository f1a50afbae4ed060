// ABOUTME: Unified error handling system for the LTI bridge server
// ABOUTME: Maps protocol error kinds to HTTP statuses and user-safe response bodies
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Unified Error Handling System
//!
//! This module defines the error taxonomy for the launch and grade-passback
//! protocol paths, the HTTP status each kind maps to, and the JSON response
//! envelope returned to clients. Detailed diagnostics stay in server-side
//! logs; response bodies carry the user-safe description only.

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Request shape (1000-1999)
    #[serde(rename = "MISSING_PARAMETER")]
    MissingParameter = 1000,
    #[serde(rename = "INVALID_SCORE")]
    InvalidScore = 1001,

    // Protocol party identity (2000-2999)
    #[serde(rename = "ISSUER_MISMATCH")]
    IssuerMismatch = 2000,
    #[serde(rename = "CLIENT_MISMATCH")]
    ClientMismatch = 2001,
    #[serde(rename = "AUDIENCE_MISMATCH")]
    AudienceMismatch = 2002,

    // Token verification (3000-3999)
    #[serde(rename = "MISSING_TOKEN")]
    MissingToken = 3000,
    #[serde(rename = "MALFORMED_TOKEN")]
    MalformedToken = 3001,
    #[serde(rename = "SIGNATURE_INVALID")]
    SignatureInvalid = 3002,
    #[serde(rename = "TOKEN_EXPIRED")]
    TokenExpired = 3003,
    #[serde(rename = "INVALID_OR_EXPIRED_NONCE")]
    InvalidOrExpiredNonce = 3004,

    // Protocol payload shape (4000-4999)
    #[serde(rename = "UNSUPPORTED_MESSAGE_TYPE")]
    UnsupportedMessageType = 4000,
    #[serde(rename = "UNSUPPORTED_VERSION")]
    UnsupportedVersion = 4001,

    // Application authentication (5000-5999)
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired = 5000,
    #[serde(rename = "AUTH_INVALID")]
    AuthInvalid = 5001,

    // External services (6000-6999)
    #[serde(rename = "VERIFIER_UNAVAILABLE")]
    VerifierUnavailable = 6000,
    #[serde(rename = "CREDENTIAL_ACQUISITION_FAILED")]
    CredentialAcquisitionFailed = 6001,
    #[serde(rename = "GRADE_PASSBACK_FAILED")]
    GradePassbackFailed = 6002,

    // Internal (9000-9999)
    #[serde(rename = "KEY_INITIALIZATION_FAILED")]
    KeyInitializationFailed = 9000,
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError = 9001,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9002,
}

impl ErrorCode {
    /// Get the default HTTP status code for this error
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            // 400 Bad Request
            Self::MissingParameter
            | Self::InvalidScore
            | Self::IssuerMismatch
            | Self::ClientMismatch
            | Self::UnsupportedMessageType
            | Self::UnsupportedVersion => 400,

            // 401 Unauthorized
            Self::AudienceMismatch
            | Self::MissingToken
            | Self::MalformedToken
            | Self::SignatureInvalid
            | Self::TokenExpired
            | Self::InvalidOrExpiredNonce
            | Self::AuthRequired
            | Self::AuthInvalid => 401,

            // 503 Service Unavailable
            Self::VerifierUnavailable => 503,

            // 500 Internal Server Error
            Self::CredentialAcquisitionFailed
            | Self::GradePassbackFailed
            | Self::KeyInitializationFailed
            | Self::DatabaseError
            | Self::InternalError => 500,
        }
    }

    /// Get a user-safe description of this error
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::MissingParameter => "A required parameter is missing from the request",
            Self::InvalidScore => "The score is outside the declared bounds",
            Self::IssuerMismatch => "The request issuer is not the trusted platform",
            Self::ClientMismatch => "The client identifier is not recognized",
            Self::AudienceMismatch => "The token audience does not match this tool",
            Self::MissingToken => "No launch token was provided",
            Self::MalformedToken => "The launch token could not be parsed",
            Self::SignatureInvalid => "The token signature could not be verified",
            Self::TokenExpired => "The token is outside its validity window",
            Self::InvalidOrExpiredNonce => "The launch session is invalid or has expired",
            Self::UnsupportedMessageType => "The LTI message type is not supported",
            Self::UnsupportedVersion => "The LTI version is not supported",
            Self::AuthRequired => "Authentication is required to access this resource",
            Self::AuthInvalid => "The provided credentials are invalid",
            Self::VerifierUnavailable => "The platform key set is currently unreachable",
            Self::CredentialAcquisitionFailed => "Could not authenticate with the platform",
            Self::GradePassbackFailed => "The grade could not be delivered to the platform",
            Self::KeyInitializationFailed => "No usable signing key is available",
            Self::DatabaseError => "Database operation failed",
            Self::InternalError => "An internal server error occurred",
        }
    }
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message (logged, and returned for
    /// non-sensitive codes)
    pub message: String,
    /// HTTP status override for paths where the protocol demands a status
    /// differing from the code's default (login-initiation issuer errors
    /// are 400 while launch-time issuer errors are 401)
    status_override: Option<u16>,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_override: None,
            source: None,
        }
    }

    /// Override the HTTP status for this error instance
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_override = Some(status);
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.status_override.unwrap_or_else(|| self.code.http_status())
    }

    /// Whether the message is safe to return to clients. External-failure
    /// and internal codes keep their diagnostic detail server-side.
    const fn message_is_client_safe(&self) -> bool {
        !matches!(
            self.code,
            ErrorCode::CredentialAcquisitionFailed
                | ErrorCode::GradePassbackFailed
                | ErrorCode::KeyInitializationFailed
                | ErrorCode::DatabaseError
                | ErrorCode::InternalError
        )
    }

    /// Missing parameter
    pub fn missing_parameter(name: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::MissingParameter,
            format!("missing required parameter: {name}"),
        )
    }

    /// Internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Invalid application credentials
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// HTTP error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorResponseDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        let message = if error.message_is_client_safe() {
            error.message.clone()
        } else {
            error.code.description().to_owned()
        };
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("request failed: {self:#}");
        } else {
            tracing::warn!("request rejected: {self}");
        }
        let body = axum::Json(ErrorResponse::from(&self));
        (status, body).into_response()
    }
}

/// Conversion from `anyhow::Error` for internal plumbing failures
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(ErrorCode::InternalError, error.to_string())
    }
}

/// Conversion from `sqlx::Error` so store round-trips can use `?`
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        Self::new(ErrorCode::DatabaseError, error.to_string()).with_source(error)
    }
}
