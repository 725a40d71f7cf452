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

//! Response types for the login service.
//!
//! Every JSON endpoint returns an [`APIResponse<T>`] envelope:
//! - On success: `{ "success": true,  "result": <T> }`
//! - On failure: `{ "success": false, "result": <APIError> }`

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Generic envelope
// ---------------------------------------------------------------------------

/// Top-level API response envelope.
///
/// # Error example
///
/// ```json
/// { "success": false, "result": { "code": "LOGIN_FAILED", "message": "..." } }
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct APIResponse<A: Serialize> {
    pub success: bool,
    pub result: A,
}

impl<A: Serialize> APIResponse<A> {
    /// Wrap a successful result.
    pub fn ok(result: A) -> Self {
        Self {
            success: true,
            result,
        }
    }

    /// Wrap a payload that describes why the request did not succeed, for
    /// failures that carry more than an [`crate::APIError`].
    pub fn failed(result: A) -> Self {
        Self {
            success: false,
            result,
        }
    }
}

impl APIResponse<crate::error::APIError> {
    /// Wrap an error result.
    pub fn error(err: crate::error::APIError) -> Self {
        Self {
            success: false,
            result: err,
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoint-specific response payloads
// ---------------------------------------------------------------------------

/// Response payload for `GET /login` when the service does not redirect
/// straight to the provider. A front-end login widget renders from it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginWidgetConfig {
    pub domain: String,
    pub client_id: String,
    pub callback_url: String,
    pub scope: String,
    pub response_type: String,
    /// Freshly issued single-use state value.
    pub state: String,
    /// Fully built authorize URL carrying the same state.
    pub authorize_url: String,
}

/// Response payload for a callback whose email is not yet verified.
///
/// The client posts `id_token` back to `resend_path` as form field `idToken`
/// to receive a new verification email.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EmailVerificationPrompt {
    pub code: String,
    pub message: String,
    pub id_token: String,
    pub resend_path: String,
}

/// Response payload for `GET /profile`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProfileResponse {
    pub account_id: i64,
    pub username: String,
}

/// Plain confirmation message.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageResponse {
    pub message: String,
}
