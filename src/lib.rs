// ABOUTME: Main library entry point for the Classera LTI bridge server
// ABOUTME: Provides LTI 1.3 launch handling, JWKS publication, and AGS grade passback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright ©2025 Async-IO.org

#![deny(unsafe_code)]

//! # LTI Bridge Server
//!
//! A protocol backend bridging the Classera learning platform and the
//! school-project frontend: LTI 1.3 login initiation and launch handling,
//! signed-token verification against the platform's published key set,
//! user/context/resource-link provisioning, and asynchronous grade
//! passback to the platform's Assignment and Grade Service.
//!
//! ## Architecture
//!
//! The server follows a modular architecture with every long-lived
//! component explicitly constructed at bootstrap:
//! - **Crypto**: RSA signing-key lifecycle and JWKS publication
//! - **Token Verifier**: remote-key-set verification of inbound tokens
//! - **Launch**: the login-initiation / launch state machine
//! - **Grades**: score delivery with durable status tracking
//! - **Database**: SQLite persistence for sessions, identities, and audit
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lti_bridge_server::config::environment::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     // Requires CLASSERA_CLIENT_ID in the environment
//!     let config = ServerConfig::from_env()?;
//!     println!("LTI bridge configured: {}", config.summary());
//!     Ok(())
//! }
//! ```

/// Configuration management (environment-only)
pub mod config;

/// Application constants and protocol strings
pub mod constants;

/// Signing-key management and JWKS publication
pub mod crypto;

/// SQLite persistence for all collections
pub mod database;

/// Unified error handling with standard error codes and HTTP responses
pub mod errors;

/// Grade passback submission to the platform AGS
pub mod grades;

/// Launch orchestration (login initiation and launch handling)
pub mod launch;

/// Logging configuration and setup
pub mod logging;

/// Core data models and typed launch claims
pub mod models;

/// Dependency-injected server resources
pub mod resources;

/// HTTP route handlers
pub mod routes;

/// Server runtime and background tasks
pub mod server;

/// Inbound launch-token verification
pub mod token_verifier;
