// ABOUTME: System-wide constants and configuration values for the LTI bridge
// ABOUTME: Contains LTI/AGS protocol constants and environment-based defaults
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Constants Module
//!
//! Application constants and environment variable configuration.
//! Protocol strings (claim URIs, message types, AGS media types) are fixed
//! by the LTI 1.3 / AGS specifications and never configurable.

use std::env;

/// LTI 1.3 protocol constants
pub mod lti {
    /// The single trusted platform issuer. This deployment is single-tenant
    /// by design; multi-issuer registration is not supported.
    pub const TRUSTED_ISSUER: &str = "https://partners.classera.com";

    /// Supported LTI version string carried in the version claim
    pub const LTI_VERSION: &str = "1.3.0";

    /// The only message type this tool accepts
    pub const MESSAGE_TYPE_RESOURCE_LINK: &str = "LtiResourceLinkRequest";

    /// Message type claim URI
    pub const CLAIM_MESSAGE_TYPE: &str =
        "https://purl.imsglobal.org/spec/lti/claim/message_type";

    /// Version claim URI
    pub const CLAIM_VERSION: &str = "https://purl.imsglobal.org/spec/lti/claim/version";

    /// Roles claim URI
    pub const CLAIM_ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";

    /// Context (course) claim URI
    pub const CLAIM_CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";

    /// Resource link claim URI
    pub const CLAIM_RESOURCE_LINK: &str =
        "https://purl.imsglobal.org/spec/lti/claim/resource_link";

    /// Deployment id claim URI
    pub const CLAIM_DEPLOYMENT_ID: &str =
        "https://purl.imsglobal.org/spec/lti/claim/deployment_id";

    /// Custom parameters claim URI
    pub const CLAIM_CUSTOM: &str = "https://purl.imsglobal.org/spec/lti/claim/custom";
}

/// Assignment and Grade Services (AGS) constants
pub mod ags {
    /// AGS endpoint claim URI (carries the lineitem URL)
    pub const CLAIM_ENDPOINT: &str =
        "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint";

    /// OAuth2 scope required to post scores
    pub const SCORE_SCOPE: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/score";

    /// Media type for score POST bodies
    pub const SCORE_CONTENT_TYPE: &str = "application/vnd.ims.lis.v1.score+json";

    /// Activity progress reported with every score
    pub const ACTIVITY_PROGRESS_COMPLETED: &str = "Completed";

    /// Grading progress reported with every score
    pub const GRADING_PROGRESS_FULLY_GRADED: &str = "FullyGraded";
}

/// Service identity constants
pub mod service {
    /// Service name used as the issuer of application tokens
    pub const SERVICE_NAME: &str = "lti-bridge-server";

    /// Audience claim stamped into application tokens
    pub const APP_TOKEN_AUDIENCE: &str = "classera-lti-frontend";

    /// Server version from Cargo.toml
    pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Default values and operational limits
pub mod defaults {
    /// Launch session time-to-live in minutes
    pub const SESSION_TTL_MINUTES: i64 = 10;

    /// Application token lifetime in seconds (1 hour)
    pub const APP_TOKEN_EXPIRY_SECS: i64 = 3600;

    /// How long a fetched platform JWKS is reused before refresh (1 hour)
    pub const JWKS_CACHE_SECS: i64 = 3600;

    /// Timeout applied to every outbound HTTPS call (JWKS fetch,
    /// credential grant, score POST)
    pub const OUTBOUND_TIMEOUT_SECS: u64 = 10;

    /// Interval between expired-session sweeps
    pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 300;

    /// Stable key id published in the JWKS document. Rotation requires a
    /// process restart with a new configured key.
    pub const SIGNING_KID: &str = "lti-bridge-key-1";

    /// Default HTTP bind port
    pub const DEFAULT_HTTP_PORT: u16 = 8081;

    /// Context sentinel for resource links launched without context claims
    pub const UNKNOWN_CONTEXT_ID: &str = "unknown";

    /// Sentinel id written into audit rows for fields not yet resolved
    /// when a launch fails early
    pub const AUDIT_SENTINEL_ID: &str = "unknown";

    /// Display name assigned when the platform omits one
    pub const UNKNOWN_USER_NAME: &str = "Unknown User";
}

/// Environment-based configuration helpers
pub mod env_config {
    use super::env;

    /// Get HTTP server port from environment or default
    #[must_use]
    pub fn http_port() -> u16 {
        env::var("HTTP_PORT")
            .unwrap_or_else(|_| super::defaults::DEFAULT_HTTP_PORT.to_string())
            .parse()
            .unwrap_or(super::defaults::DEFAULT_HTTP_PORT)
    }

    /// Get database URL from environment or default
    #[must_use]
    pub fn database_url() -> String {
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./data/lti_bridge.db".into())
    }

    /// Get frontend base URL from environment or default
    #[must_use]
    pub fn frontend_url() -> String {
        env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".into())
    }

    /// Get launch session TTL in minutes from environment or default
    #[must_use]
    pub fn session_ttl_minutes() -> i64 {
        env::var("SESSION_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(super::defaults::SESSION_TTL_MINUTES)
    }
}
