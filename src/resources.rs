// ABOUTME: Dependency container wiring configuration, storage, keys, and protocol components
// ABOUTME: Constructed once at bootstrap and shared behind an Arc with every route handler
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright ©2025 Async-IO.org

//! # Server Resources
//!
//! All long-lived components are constructed here, explicitly, at process
//! bootstrap and injected into the orchestrator, the submitter, and the
//! route handlers. Nothing in this crate reaches for hidden module-level
//! state: the signing key and JWKS cache live inside the [`KeyManager`]
//! instance owned by this container.

use crate::config::environment::ServerConfig;
use crate::crypto::KeyManager;
use crate::database::Database;
use crate::grades::GradeSubmitter;
use crate::launch::LaunchOrchestrator;
use crate::token_verifier::TokenVerifier;
use std::sync::Arc;

/// Shared resources for all request handlers
pub struct ServerResources {
    pub config: Arc<ServerConfig>,
    pub database: Arc<Database>,
    pub key_manager: Arc<KeyManager>,
    pub verifier: Arc<TokenVerifier>,
    pub orchestrator: LaunchOrchestrator,
    pub submitter: GradeSubmitter,
}

impl ServerResources {
    /// Wire the component graph from its leaves
    #[must_use]
    pub fn new(config: ServerConfig, database: Database, key_manager: KeyManager) -> Self {
        let config = Arc::new(config);
        let database = Arc::new(database);
        let key_manager = Arc::new(key_manager);
        let verifier = Arc::new(TokenVerifier::new());

        let orchestrator = LaunchOrchestrator::new(
            config.clone(),
            database.clone(),
            key_manager.clone(),
            verifier.clone(),
        );
        let submitter = GradeSubmitter::new(config.clone(), database.clone());

        Self {
            config,
            database,
            key_manager,
            verifier,
            orchestrator,
            submitter,
        }
    }
}
