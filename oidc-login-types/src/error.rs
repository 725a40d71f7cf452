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

//! API error types.
//!
//! Every failed API response is returned as `APIResponse<APIError>` with `success: false`.

use serde::{Deserialize, Serialize};

/// Structured error returned in the `result` field of a failed [`super::APIResponse`].
///
/// The `code` field is a machine-readable identifier (e.g. `"LOGIN_FAILED"`).
/// The `message` field is a human-readable description suitable for display.
/// The `engineering_error` field carries debug-level detail that is useful
/// during development but should be stripped or redacted in production.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct APIError {
    /// Machine-readable error code (e.g. `"UNAUTHORIZED"`, `"EMAIL_NOT_SET"`).
    pub code: String,

    /// Human-readable error message.
    pub message: String,

    /// Optional engineering-level detail for debugging.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engineering_error: Option<String>,
}

impl APIError {
    pub const LOGIN_FAILED: &'static str = "LOGIN_FAILED";
    pub const EMAIL_NOT_SET: &'static str = "EMAIL_NOT_SET";
    pub const EMAIL_NOT_VERIFIED: &'static str = "EMAIL_NOT_VERIFIED";

    pub fn unauthorized() -> Self {
        Self {
            code: "UNAUTHORIZED".to_string(),
            message: "Authentication required.".to_string(),
            engineering_error: None,
        }
    }

    /// The one message shown for every verification-layer failure. It must not
    /// reveal which check failed.
    pub fn login_failed() -> Self {
        Self {
            code: Self::LOGIN_FAILED.to_string(),
            message: "There was a problem logging you in, sorry for the inconvenience."
                .to_string(),
            engineering_error: None,
        }
    }

    pub fn email_not_set() -> Self {
        Self {
            code: Self::EMAIL_NOT_SET.to_string(),
            message: "This account does not have an email associated. \
                      Please login with a different provider."
                .to_string(),
            engineering_error: None,
        }
    }

    pub fn email_not_verified() -> Self {
        Self {
            code: Self::EMAIL_NOT_VERIFIED.to_string(),
            message: "Please verify your email address before logging in.".to_string(),
            engineering_error: None,
        }
    }

    pub fn resend_token_invalid() -> Self {
        Self {
            code: "RESEND_TOKEN_INVALID".to_string(),
            message: "There was a problem resending the verification email, \
                      sorry for the inconvenience."
                .to_string(),
            engineering_error: None,
        }
    }

    pub fn session_expired() -> Self {
        Self {
            code: "SESSION_EXPIRED".to_string(),
            message: "Your session has expired.".to_string(),
            engineering_error: None,
        }
    }

    pub fn verification_email_failed(detail: &str) -> Self {
        Self {
            code: "VERIFICATION_EMAIL_FAILED".to_string(),
            message: "Sorry, we couldn't send the email.".to_string(),
            engineering_error: Some(detail.to_string()),
        }
    }

    pub fn internal_error(detail: &str) -> Self {
        Self {
            code: "INTERNAL_ERROR".to_string(),
            message: "Internal server error".to_string(),
            engineering_error: Some(detail.to_string()),
        }
    }
}

impl std::fmt::Display for APIError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for APIError {}
