// ABOUTME: Launch orchestration for LTI 1.3 login initiation and launch handling
// ABOUTME: Ties together session issuance, token verification, provisioning, and app-token issuance
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Launch Orchestrator
//!
//! The state machine over a single launch attempt:
//!
//! ```text
//! IDLE -> LOGIN_INITIATED -> AWAITING_LAUNCH -> VERIFIED -> PROVISIONED -> COMPLETE
//!                                             \-> REJECTED (terminal, any step)
//! ```
//!
//! Login initiation validates the platform's request, issues an
//! independent nonce/state pair, persists a launch session, and redirects
//! to the platform's authorization endpoint. The launch callback verifies
//! the posted token, consumes the session (single-use, enforced
//! atomically by the store), provisions user/context/resource-link
//! entities, audits the attempt, and redirects to the frontend with an
//! application token.
//!
//! Every launch attempt — success or failure, however early the failure —
//! produces exactly one audit record; fields that were never resolved are
//! recorded with a sentinel id.

use crate::config::environment::ServerConfig;
use crate::constants::{defaults, lti};
use crate::crypto::KeyManager;
use crate::database::Database;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::models::{
    CourseContext, LaunchClaims, LaunchOutcome, LaunchRecord, LtiRole, ResourceLink, UserIdentity,
};
use crate::token_verifier::TokenVerifier;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

/// One ordered rule of the role classifier
#[derive(Debug, Clone)]
pub struct RoleRule {
    /// Lowercase substring searched for in each claimed role
    pub needle: String,
    /// Role resolved when the needle matches
    pub role: LtiRole,
}

impl RoleRule {
    /// Create a rule from a needle and target role
    #[must_use]
    pub fn new(needle: &str, role: LtiRole) -> Self {
        Self {
            needle: needle.to_lowercase(),
            role,
        }
    }
}

/// The default classifier: instructor and teacher vocabulary resolve to
/// teacher before administrator is considered; everything else is a
/// student. First matching rule wins, so precedence is the list order.
#[must_use]
pub fn default_role_rules() -> Vec<RoleRule> {
    vec![
        RoleRule::new("instructor", LtiRole::Teacher),
        RoleRule::new("teacher", LtiRole::Teacher),
        RoleRule::new("administrator", LtiRole::Admin),
    ]
}

/// Map claimed platform roles to exactly one internal role using an
/// ordered rule list (case-insensitive substring match)
#[must_use]
pub fn map_roles(claimed: &[String], rules: &[RoleRule]) -> LtiRole {
    let lowered: Vec<String> = claimed.iter().map(|role| role.to_lowercase()).collect();
    for rule in rules {
        if lowered.iter().any(|role| role.contains(&rule.needle)) {
            return rule.role;
        }
    }
    LtiRole::Student
}

/// Login initiation parameters, accepted from either a query-string (GET)
/// or form-body (POST) representation. Fields are optional at the
/// transport layer so missing values surface as `MissingParameter`
/// instead of a framework rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginInitiationParams {
    pub iss: Option<String>,
    pub login_hint: Option<String>,
    pub target_link_uri: Option<String>,
    pub client_id: Option<String>,
    pub lti_message_hint: Option<String>,
}

/// Result of a completed launch: where to send the user, and as whom
#[derive(Debug, Clone)]
pub struct CompletedLaunch {
    pub redirect_url: String,
    pub role: LtiRole,
}

/// Resolved entity ids carried through a launch attempt for the audit
/// record; unresolved fields keep the sentinel
struct LaunchAudit {
    user_id: String,
    context_id: String,
    resource_link_id: String,
}

impl Default for LaunchAudit {
    fn default() -> Self {
        Self {
            user_id: defaults::AUDIT_SENTINEL_ID.to_owned(),
            context_id: defaults::AUDIT_SENTINEL_ID.to_owned(),
            resource_link_id: defaults::AUDIT_SENTINEL_ID.to_owned(),
        }
    }
}

/// Orchestrates login initiation and launch handling. All collaborators
/// are injected at construction; the orchestrator itself is stateless
/// between requests.
pub struct LaunchOrchestrator {
    config: Arc<ServerConfig>,
    database: Arc<Database>,
    key_manager: Arc<KeyManager>,
    verifier: Arc<TokenVerifier>,
    role_rules: Vec<RoleRule>,
}

impl LaunchOrchestrator {
    /// Create an orchestrator with the default role classifier
    #[must_use]
    pub fn new(
        config: Arc<ServerConfig>,
        database: Arc<Database>,
        key_manager: Arc<KeyManager>,
        verifier: Arc<TokenVerifier>,
    ) -> Self {
        Self::with_role_rules(config, database, key_manager, verifier, default_role_rules())
    }

    /// Create an orchestrator with an explicit ordered role classifier
    #[must_use]
    pub fn with_role_rules(
        config: Arc<ServerConfig>,
        database: Arc<Database>,
        key_manager: Arc<KeyManager>,
        verifier: Arc<TokenVerifier>,
        role_rules: Vec<RoleRule>,
    ) -> Self {
        Self {
            config,
            database,
            key_manager,
            verifier,
            role_rules,
        }
    }

    /// Handle a login initiation request: validate, create a session,
    /// and return the platform authorization redirect target.
    ///
    /// # Errors
    ///
    /// - [`ErrorCode::MissingParameter`] when a required field is absent
    /// - [`ErrorCode::IssuerMismatch`] / [`ErrorCode::ClientMismatch`]
    ///   when the caller is not the configured platform
    pub async fn initiate_login(&self, params: &LoginInitiationParams) -> AppResult<String> {
        let iss = require_param(params.iss.as_deref(), "iss")?;
        let login_hint = require_param(params.login_hint.as_deref(), "login_hint")?;
        let target_link_uri = require_param(params.target_link_uri.as_deref(), "target_link_uri")?;
        let client_id = require_param(params.client_id.as_deref(), "client_id")?;

        if iss != self.config.platform.issuer {
            return Err(AppError::new(
                ErrorCode::IssuerMismatch,
                format!("login initiation from untrusted issuer {iss}"),
            ));
        }
        if client_id != self.config.platform.client_id {
            return Err(AppError::new(
                ErrorCode::ClientMismatch,
                format!("login initiation for unknown client {client_id}"),
            ));
        }

        let nonce = generate_opaque_token()?;
        let state = generate_opaque_token()?;

        self.database
            .create_session(&nonce, &state, self.config.session_ttl_minutes)
            .await?;

        let mut url = Url::parse(&self.config.platform.auth_url).map_err(|e| {
            AppError::internal(format!("configured platform auth URL is invalid: {e}"))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("scope", "openid")
                .append_pair("response_type", "id_token")
                .append_pair("response_mode", "form_post")
                .append_pair("prompt", "none")
                .append_pair("client_id", client_id)
                .append_pair("redirect_uri", target_link_uri)
                .append_pair("login_hint", login_hint)
                .append_pair("state", &state)
                .append_pair("nonce", &nonce);
            if let Some(hint) = params.lti_message_hint.as_deref() {
                query.append_pair("lti_message_hint", hint);
            }
        }

        info!("login initiated for hint {login_hint}, session created");
        Ok(url.into())
    }

    /// Handle the platform's launch callback. Exactly one audit record is
    /// written per attempt; failures propagate after the record is
    /// written.
    ///
    /// # Errors
    ///
    /// Propagates verifier failures plus the protocol checks documented
    /// on [`ErrorCode`]. Launch-time issuer failures carry HTTP 401.
    pub async fn handle_launch(
        &self,
        id_token: Option<&str>,
        state: Option<&str>,
    ) -> AppResult<CompletedLaunch> {
        let mut audit = LaunchAudit::default();

        match self.run_launch(id_token, state, &mut audit).await {
            Ok(user) => {
                self.write_audit_record(&audit, LaunchOutcome::Success, None)
                    .await;
                self.complete_launch(&user)
            }
            Err(error) => {
                self.write_audit_record(&audit, LaunchOutcome::Failure, Some(error.to_string()))
                    .await;
                Err(error)
            }
        }
    }

    /// Steps 1-9: verify, consume the session, and provision entities
    async fn run_launch(
        &self,
        id_token: Option<&str>,
        state: Option<&str>,
        audit: &mut LaunchAudit,
    ) -> AppResult<UserIdentity> {
        let id_token = id_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AppError::new(ErrorCode::MissingToken, "launch posted no id_token"))?;

        let claims = self
            .verifier
            .verify(id_token, &self.config.platform.jwks_url)
            .await?;

        self.check_parties(&claims)?;
        self.consume_session(&claims, state).await?;
        check_payload_shape(&claims)?;

        let role = map_roles(&claims.roles, &self.role_rules);
        let user = self.provision_user(&claims, role).await?;
        audit.user_id = user.id.to_string();

        let context_id = self.provision_context(&claims).await?;
        if let Some(id) = context_id.as_deref() {
            audit.context_id = id.to_owned();
        }

        if let Some(link_id) = self.provision_resource_link(&claims, context_id).await? {
            audit.resource_link_id = link_id;
        }

        Ok(user)
    }

    /// Step 3: issuer and audience must match configuration. These are
    /// 401s at launch time (the token verified but names the wrong
    /// parties), unlike their 400 counterparts at login initiation.
    fn check_parties(&self, claims: &LaunchClaims) -> AppResult<()> {
        if claims.iss != self.config.platform.issuer {
            return Err(AppError::new(
                ErrorCode::IssuerMismatch,
                format!("launch token issued by {}", claims.iss),
            )
            .with_status(401));
        }
        if !claims.aud.contains(&self.config.platform.client_id) {
            return Err(AppError::new(
                ErrorCode::AudienceMismatch,
                "launch token audience does not include this tool",
            ));
        }
        Ok(())
    }

    /// Step 4: consume the session named by the token nonce. The store
    /// deletes the row in the same operation that returns it, so a nonce
    /// can never be accepted twice; unknown, already-consumed, and
    /// expired nonces are indistinguishable here by design.
    async fn consume_session(
        &self,
        claims: &LaunchClaims,
        state: Option<&str>,
    ) -> AppResult<()> {
        let nonce = claims.nonce.as_deref().ok_or_else(|| {
            AppError::new(ErrorCode::InvalidOrExpiredNonce, "launch token carries no nonce")
        })?;

        let session = self
            .database
            .take_session_by_nonce(nonce)
            .await?
            .ok_or_else(|| {
                AppError::new(
                    ErrorCode::InvalidOrExpiredNonce,
                    "no live session for the presented nonce",
                )
            })?;

        if state != Some(session.state.as_str()) {
            return Err(AppError::new(
                ErrorCode::InvalidOrExpiredNonce,
                "launch state does not match the initiated session",
            ));
        }

        Ok(())
    }

    /// Step 7: provision or refresh the user identity
    async fn provision_user(&self, claims: &LaunchClaims, role: LtiRole) -> AppResult<UserIdentity> {
        let now = Utc::now();

        let user = match self.database.get_user_by_lti_id(&claims.sub).await? {
            Some(mut user) => {
                if let Some(name) = claims.name.clone() {
                    user.name = name;
                }
                if let Some(email) = claims.email.clone() {
                    user.email = email;
                }
                if let Some(platform_user_id) = claims.platform_user_id() {
                    user.platform_user_id = Some(platform_user_id);
                }
                user.given_name = claims.given_name.clone().or(user.given_name);
                user.family_name = claims.family_name.clone().or(user.family_name);
                user.role = role;
                user.updated_at = now;
                self.database.update_user_identity(&user).await?;
                user
            }
            None => {
                let user = UserIdentity {
                    id: Uuid::new_v4(),
                    lti_user_id: claims.sub.clone(),
                    platform_user_id: claims.platform_user_id(),
                    name: claims
                        .name
                        .clone()
                        .unwrap_or_else(|| defaults::UNKNOWN_USER_NAME.to_owned()),
                    email: claims
                        .email
                        .clone()
                        .unwrap_or_else(|| format!("{}@lti.local", claims.sub)),
                    given_name: claims.given_name.clone(),
                    family_name: claims.family_name.clone(),
                    role,
                    enabled: true,
                    created_at: now,
                    updated_at: now,
                };
                self.database.create_user_identity(&user).await?;
                info!("provisioned new identity for subject {}", claims.sub);
                user
            }
        };

        Ok(user)
    }

    /// Step 8: upsert the course context when the token carries one
    async fn provision_context(&self, claims: &LaunchClaims) -> AppResult<Option<String>> {
        let Some(context_claim) = claims.context.as_ref() else {
            return Ok(None);
        };

        let context = CourseContext {
            context_id: context_claim.id.clone(),
            title: context_claim.title.clone(),
            label: context_claim.label.clone(),
            course_id: claims.course_id(),
            platform: claims.iss.clone(),
        };
        self.database.upsert_context(&context).await?;

        Ok(Some(context.context_id))
    }

    /// Step 9: upsert the resource link when the token carries one,
    /// refreshing the score endpoint from the latest claims
    async fn provision_resource_link(
        &self,
        claims: &LaunchClaims,
        context_id: Option<String>,
    ) -> AppResult<Option<String>> {
        let Some(link_claim) = claims.resource_link.as_ref() else {
            return Ok(None);
        };

        let link = ResourceLink {
            resource_link_id: link_claim.id.clone(),
            title: link_claim.title.clone(),
            description: link_claim.description.clone(),
            context_id: context_id.unwrap_or_else(|| defaults::UNKNOWN_CONTEXT_ID.to_owned()),
            score_endpoint_url: claims
                .endpoint
                .as_ref()
                .and_then(|endpoint| endpoint.lineitem.clone()),
        };
        self.database.upsert_resource_link(&link).await?;

        Ok(Some(link.resource_link_id))
    }

    /// Step 11: issue the application token and build the frontend
    /// redirect
    fn complete_launch(&self, user: &UserIdentity) -> AppResult<CompletedLaunch> {
        let token =
            self.key_manager
                .issue_app_token(&user.lti_user_id, user.role.as_str(), user.enabled)?;

        let base = self.config.frontend_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/lti/callback")).map_err(|e| {
            AppError::internal(format!("configured frontend URL is invalid: {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("token", &token)
            .append_pair("role", user.role.as_str());

        info!(
            "launch complete for subject {} as {}",
            user.lti_user_id, user.role
        );
        Ok(CompletedLaunch {
            redirect_url: url.into(),
            role: user.role,
        })
    }

    /// Write the single audit record for this attempt. Best-effort: a
    /// failing audit write is logged and never masks the launch outcome.
    async fn write_audit_record(
        &self,
        audit: &LaunchAudit,
        outcome: LaunchOutcome,
        error_message: Option<String>,
    ) {
        let record = LaunchRecord {
            id: Uuid::new_v4(),
            user_id: audit.user_id.clone(),
            context_id: audit.context_id.clone(),
            resource_link_id: audit.resource_link_id.clone(),
            timestamp: Utc::now(),
            outcome,
            error_message,
        };

        if let Err(e) = self.database.insert_launch_record(&record).await {
            warn!("failed to write launch audit record: {e}");
        }
    }
}

/// Step 5: only resource-link requests at the supported LTI version
fn check_payload_shape(claims: &LaunchClaims) -> AppResult<()> {
    match claims.message_type.as_deref() {
        Some(lti::MESSAGE_TYPE_RESOURCE_LINK) => {}
        other => {
            return Err(AppError::new(
                ErrorCode::UnsupportedMessageType,
                format!("unsupported message type {:?}", other.unwrap_or("<missing>")),
            ));
        }
    }
    match claims.version.as_deref() {
        Some(lti::LTI_VERSION) => {}
        other => {
            return Err(AppError::new(
                ErrorCode::UnsupportedVersion,
                format!("unsupported LTI version {:?}", other.unwrap_or("<missing>")),
            ));
        }
    }
    Ok(())
}

fn require_param<'a>(value: Option<&'a str>, name: &str) -> AppResult<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::missing_parameter(name))
}

/// Generate an opaque random token with 256 bits of entropy,
/// base64url-encoded without padding
fn generate_opaque_token() -> AppResult<String> {
    use ring::rand::{SecureRandom, SystemRandom};

    let rng = SystemRandom::new();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes).map_err(|_| {
        AppError::internal("system RNG failure - cannot generate session token")
    })?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
