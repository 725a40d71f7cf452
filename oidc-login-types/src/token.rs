/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 */

//! Local session token (JWT) claims.
//!
//! After a successful OIDC login the service signs a session token (HMAC-SHA256)
//! and stores it in an `HttpOnly` cookie. Every authenticated endpoint validates
//! the signature and reads the claims from it.

use serde::{Deserialize, Serialize};

/// JWT payload for a local session.
///
/// # Example payload
///
/// ```json
/// {
///   "sub": "42",
///   "username": "alice",
///   "exp": 1707004800,
///   "iss": "oidc-login"
/// }
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionTokenClaims {
    /// Local account id, as a decimal string.
    pub sub: String,

    /// Username of the local account at login time.
    pub username: String,

    /// Expiration timestamp (Unix seconds).
    pub exp: i64,

    /// Issuer identifier. Always `"oidc-login"`.
    pub iss: String,
}

impl SessionTokenClaims {
    /// The expected issuer value for session tokens produced by this service.
    pub const ISSUER: &'static str = "oidc-login";
}
