// ABOUTME: Cryptography module providing signing-key management for the LTI bridge
// ABOUTME: Centralizes RSA key lifecycle, JWKS publication, and application-token signing
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! Cryptographic utilities for the LTI bridge server

pub mod keys;

pub use keys::{AppTokenClaims, JsonWebKey, JsonWebKeySet, KeyManager, RsaKeyPair};
