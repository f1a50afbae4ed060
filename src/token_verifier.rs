// ABOUTME: Inbound launch-token verification against the platform's published key set
// ABOUTME: Fetches and caches the remote JWKS, verifies RS256 signatures and temporal claims
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Token Verifier
//!
//! Cryptographic validation of inbound launch tokens. The verifier fetches
//! the issuer's JWKS over HTTPS with a bounded timeout, caches it
//! in-process, and verifies a token's RS256 signature against the key
//! matching its header `kid` plus the standard temporal claims.
//!
//! Issuer, audience, and nonce checks are protocol policy and live in the
//! launch orchestrator; this module is deliberately limited to generic
//! crypto verification.

use crate::constants::defaults;
use crate::crypto::{JsonWebKey, JsonWebKeySet};
use crate::errors::{AppError, ErrorCode};
use crate::models::LaunchClaims;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;

/// Remote JWKS snapshot with its fetch time
struct CachedJwks {
    fetched_at: DateTime<Utc>,
    keys: Vec<JsonWebKey>,
}

/// Verifies inbound signed launch tokens against a remote key set.
///
/// The cache may be refreshed concurrently by multiple in-flight
/// verifications; last write wins, which is acceptable because every
/// fetch targets the same JWKS URL.
pub struct TokenVerifier {
    http: reqwest::Client,
    cache: RwLock<Option<CachedJwks>>,
}

impl TokenVerifier {
    /// Create a verifier with a bounded-timeout HTTP client
    #[must_use]
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(defaults::OUTBOUND_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http,
            cache: RwLock::new(None),
        }
    }

    /// Verify a compact-serialized launch token against the issuer's
    /// published key set and return its decoded claims.
    ///
    /// # Errors
    ///
    /// - [`ErrorCode::MalformedToken`] if the token cannot be parsed
    /// - [`ErrorCode::TokenExpired`] if outside its validity window
    /// - [`ErrorCode::SignatureInvalid`] if no published key verifies it
    /// - [`ErrorCode::VerifierUnavailable`] if the JWKS cannot be fetched
    pub async fn verify(&self, token: &str, jwks_url: &str) -> Result<LaunchClaims, AppError> {
        let header = decode_header(token).map_err(|e| {
            AppError::new(
                ErrorCode::MalformedToken,
                format!("token header could not be decoded: {e}"),
            )
        })?;

        let mut keys = self.keys(jwks_url, false).await?;

        // Unknown kid may mean the platform rotated its keys since our
        // last fetch; refresh once before giving up.
        if Self::candidate_keys(&keys, header.kid.as_deref()).is_empty() && header.kid.is_some() {
            keys = self.keys(jwks_url, true).await?;
        }
        let candidates = Self::candidate_keys(&keys, header.kid.as_deref());

        if candidates.is_empty() {
            return Err(AppError::new(
                ErrorCode::SignatureInvalid,
                format!(
                    "no key in the platform JWKS matches kid {:?}",
                    header.kid.as_deref().unwrap_or("<none>")
                ),
            ));
        }

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false; // orchestrator policy

        let mut last_error: Option<jsonwebtoken::errors::Error> = None;
        for jwk in candidates {
            let decoding_key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(|e| {
                AppError::new(
                    ErrorCode::VerifierUnavailable,
                    format!("platform JWKS contains an unusable key: {e}"),
                )
            })?;

            match decode::<LaunchClaims>(token, &decoding_key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => {
                    // A temporal failure means the signature verified; no
                    // other key can do better.
                    if matches!(
                        e.kind(),
                        jsonwebtoken::errors::ErrorKind::ExpiredSignature
                            | jsonwebtoken::errors::ErrorKind::ImmatureSignature
                    ) {
                        return Err(Self::convert_jwt_error(&e));
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.map_or_else(
            || AppError::new(ErrorCode::SignatureInvalid, "token verification failed"),
            |e| Self::convert_jwt_error(&e),
        ))
    }

    /// Return cached keys, fetching from the JWKS URL when the cache is
    /// empty, stale, or a forced refresh is requested
    async fn keys(&self, jwks_url: &str, force: bool) -> Result<Vec<JsonWebKey>, AppError> {
        if !force {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let age = Utc::now() - cached.fetched_at;
                if age < Duration::seconds(defaults::JWKS_CACHE_SECS) {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let jwks = self.fetch_jwks(jwks_url).await?;
        let keys = jwks.keys;

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            fetched_at: Utc::now(),
            keys: keys.clone(),
        });

        Ok(keys)
    }

    async fn fetch_jwks(&self, jwks_url: &str) -> Result<JsonWebKeySet, AppError> {
        tracing::debug!("fetching platform JWKS from {jwks_url}");

        let response = self.http.get(jwks_url).send().await.map_err(|e| {
            AppError::new(
                ErrorCode::VerifierUnavailable,
                format!("JWKS fetch from {jwks_url} failed: {e}"),
            )
            .with_source(e)
        })?;

        if !response.status().is_success() {
            return Err(AppError::new(
                ErrorCode::VerifierUnavailable,
                format!("JWKS fetch from {jwks_url} returned {}", response.status()),
            ));
        }

        response.json::<JsonWebKeySet>().await.map_err(|e| {
            AppError::new(
                ErrorCode::VerifierUnavailable,
                format!("JWKS from {jwks_url} could not be parsed: {e}"),
            )
            .with_source(e)
        })
    }

    /// Keys to try for a token: the kid match when a kid is present,
    /// otherwise every published key
    fn candidate_keys<'a>(keys: &'a [JsonWebKey], kid: Option<&str>) -> Vec<&'a JsonWebKey> {
        match kid {
            Some(kid) => keys.iter().filter(|key| key.kid == kid).collect(),
            None => keys.iter().collect(),
        }
    }

    /// Convert JWT library errors into the taxonomy of spec-visible kinds
    fn convert_jwt_error(e: &jsonwebtoken::errors::Error) -> AppError {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::ExpiredSignature => {
                AppError::new(ErrorCode::TokenExpired, "token has expired")
            }
            ErrorKind::ImmatureSignature => {
                AppError::new(ErrorCode::TokenExpired, "token is not yet valid")
            }
            ErrorKind::InvalidSignature => AppError::new(
                ErrorCode::SignatureInvalid,
                "token signature verification failed",
            ),
            ErrorKind::InvalidToken => {
                AppError::new(ErrorCode::MalformedToken, "token format is invalid")
            }
            ErrorKind::Base64(err) => AppError::new(
                ErrorCode::MalformedToken,
                format!("token contains invalid base64: {err}"),
            ),
            ErrorKind::Json(err) => AppError::new(
                ErrorCode::MalformedToken,
                format!("token claims contain invalid JSON: {err}"),
            ),
            ErrorKind::Utf8(err) => AppError::new(
                ErrorCode::MalformedToken,
                format!("token contains invalid UTF-8: {err}"),
            ),
            _ => AppError::new(
                ErrorCode::SignatureInvalid,
                format!("token validation failed: {e}"),
            ),
        }
    }
}

impl Default for TokenVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwk(kid: &str) -> JsonWebKey {
        JsonWebKey {
            kty: "RSA".into(),
            key_use: "sig".into(),
            kid: kid.into(),
            alg: "RS256".into(),
            n: "AQAB".into(),
            e: "AQAB".into(),
        }
    }

    #[test]
    fn test_candidate_keys_filters_by_kid() {
        let keys = vec![jwk("a"), jwk("b")];
        let matched = TokenVerifier::candidate_keys(&keys, Some("b"));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].kid, "b");

        assert!(TokenVerifier::candidate_keys(&keys, Some("missing")).is_empty());
        assert_eq!(TokenVerifier::candidate_keys(&keys, None).len(), 2);
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let verifier = TokenVerifier::new();
        let err = verifier
            .verify("not-a-jwt", "http://127.0.0.1:1/jwks")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MalformedToken);
    }

    #[tokio::test]
    async fn test_unreachable_jwks_is_verifier_unavailable() {
        let verifier = TokenVerifier::new();
        // Structurally valid JWS so header decoding succeeds and the
        // fetch is attempted against a port nothing listens on.
        let token = "eyJhbGciOiJSUzI1NiIsImtpZCI6ImsxIiwidHlwIjoiSldUIn0.e30.c2ln";
        let err = verifier
            .verify(token, "http://127.0.0.1:1/jwks")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::VerifierUnavailable);
    }
}
