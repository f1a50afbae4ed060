// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, deployment modes, and credential selection
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Environment-based configuration management for production deployment

use crate::constants::{env_config, lti};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

/// Deployment environment, selecting which platform credential is used
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse from string with fallback to development
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" => Self::Staging,
            _ => Self::Development,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything this tool knows about the external platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// The trusted issuer; fixed, single-tenant (see `constants::lti`)
    pub issuer: String,
    /// OIDC client id registered with the platform
    pub client_id: String,
    /// Authorization endpoint login initiation redirects to
    pub auth_url: String,
    /// Token endpoint used for the AGS client-credentials grant
    pub token_url: String,
    /// Published key set launch tokens are verified against
    pub jwks_url: String,
    /// Client-credentials secret, selected per deployment environment
    pub client_secret: String,
}

/// Server configuration loaded from environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP bind port
    pub http_port: u16,
    /// SQLite database URL
    pub database_url: String,
    /// Frontend base URL launch redirects target
    pub frontend_url: String,
    /// Deployment environment
    pub environment: Environment,
    /// External platform endpoints and credentials
    pub platform: PlatformConfig,
    /// Configured RSA signing key PEM, if any (the key manager
    /// normalizes quoting/escaping and falls back to generation)
    pub signing_key_pem: Option<String>,
    /// Launch session TTL in minutes
    pub session_ttl_minutes: i64,
    /// Origins allowed by the CORS layer
    pub cors_allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable (`CLASSERA_CLIENT_ID`) is
    /// missing. Optional values fall back to documented defaults.
    pub fn from_env() -> Result<Self> {
        let environment = Environment::from_str_or_default(
            &env::var("ENVIRONMENT").unwrap_or_default(),
        );

        let client_id = env::var("CLASSERA_CLIENT_ID")
            .context("CLASSERA_CLIENT_ID must be set to the client id registered with Classera")?;

        let client_secret = Self::select_client_secret(environment);

        let frontend_url = env_config::frontend_url();
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|origin| origin.trim().to_owned())
                    .filter(|origin| !origin.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec![frontend_url.clone()]);

        Ok(Self {
            http_port: env_config::http_port(),
            database_url: env_config::database_url(),
            frontend_url,
            environment,
            platform: PlatformConfig {
                issuer: lti::TRUSTED_ISSUER.to_owned(),
                client_id,
                auth_url: env::var("CLASSERA_AUTH_URL")
                    .unwrap_or_else(|_| format!("{}/lti/authorize", lti::TRUSTED_ISSUER)),
                token_url: env::var("CLASSERA_TOKEN_URL")
                    .unwrap_or_else(|_| format!("{}/lti/token", lti::TRUSTED_ISSUER)),
                jwks_url: env::var("CLASSERA_JWKS_URL")
                    .unwrap_or_else(|_| format!("{}/lti/jwks", lti::TRUSTED_ISSUER)),
                client_secret,
            },
            signing_key_pem: env::var("LTI_SIGNING_KEY_PEM").ok(),
            session_ttl_minutes: env_config::session_ttl_minutes(),
            cors_allowed_origins,
        })
    }

    /// Select the platform client secret for the deployment environment.
    /// Production reads the production variable; staging and development
    /// read the staging variable, falling back to production if that is
    /// the only one configured.
    fn select_client_secret(environment: Environment) -> String {
        let (primary, fallback) = match environment {
            Environment::Production => {
                ("CLASSERA_CLIENT_SECRET", "CLASSERA_CLIENT_SECRET_STAGING")
            }
            Environment::Staging | Environment::Development => {
                ("CLASSERA_CLIENT_SECRET_STAGING", "CLASSERA_CLIENT_SECRET")
            }
        };

        env::var(primary)
            .or_else(|_| env::var(fallback))
            .unwrap_or_else(|_| {
                warn!("no Classera client secret configured; grade passback will fail");
                String::new()
            })
    }

    /// One-line startup summary, with secrets elided
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "env={} port={} issuer={} client_id={} frontend={} session_ttl={}m db={}",
            self.environment,
            self.http_port,
            self.platform.issuer,
            self.platform.client_id,
            self.frontend_url,
            self.session_ttl_minutes,
            self.database_url
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::from_str_or_default("production"),
            Environment::Production
        );
        assert_eq!(
            Environment::from_str_or_default("PROD"),
            Environment::Production
        );
        assert_eq!(
            Environment::from_str_or_default("staging"),
            Environment::Staging
        );
        assert_eq!(
            Environment::from_str_or_default(""),
            Environment::Development
        );
        assert_eq!(
            Environment::from_str_or_default("weird"),
            Environment::Development
        );
    }
}
