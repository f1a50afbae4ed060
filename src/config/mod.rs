// ABOUTME: Configuration management module for centralized server settings
// ABOUTME: Handles environment-driven configuration for the LTI bridge server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright ©2025 Async-IO.org

//! Configuration module for the LTI bridge server
//!
//! Configuration is environment-only: every setting is read from
//! environment variables at startup into a strongly typed [`environment::ServerConfig`]
//! that is explicitly constructed and injected into the components that
//! need it. There is no configuration file and no mutable global state.

/// Environment and server configuration
pub mod environment;
