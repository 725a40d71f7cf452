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

//! Error taxonomy for the login flow and its collaborators.

use thiserror::Error;

use oidc_login_types::APIError;

/// Why an ID token was not trusted.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JWT validation failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("token signed with {found:?}, only {expected:?} is accepted")]
    AlgorithmMismatch {
        expected: jsonwebtoken::Algorithm,
        found: jsonwebtoken::Algorithm,
    },

    #[error("JWT header missing kid")]
    MissingKeyId,

    #[error("JWKS key not found for kid: {0}")]
    UnknownKey(String),

    #[error("JWKS unavailable: {0}")]
    Jwks(String),

    #[error("client secret is not valid base64: {0}")]
    Secret(#[from] base64::DecodeError),
}

/// Failure talking to the identity provider over HTTP.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    Decode(String),
}

/// Failure of a storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique key was already taken (e.g. a concurrent first login inserted
    /// the same external id).
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode record: {0}")]
    Encoding(String),
}

/// Everything that can end a login attempt.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("authorization code exchange failed: {0}")]
    ExchangeFailure(#[source] ProviderError),

    #[error("ID token rejected: {0}")]
    TokenInvalid(#[from] TokenError),

    #[error("state {0:?} does not match an outstanding nonce")]
    StateMismatch(String),

    #[error("profile subject {profile} does not match token subject {token}")]
    SubjectMismatch { profile: String, token: String },

    #[error("external profile has no email")]
    EmailNotSet,

    #[error("external email is not verified")]
    EmailNotVerified,

    #[error("provider returned {error}: {description}")]
    ProviderDenied { error: String, description: String },

    #[error("callback is missing {0}")]
    MalformedCallback(&'static str),

    #[error("infrastructure failure: {0}")]
    Infrastructure(#[from] StoreError),
}

impl LoginError {
    /// Failures of the verification layer. They share one user-facing message
    /// so that a probe cannot tell which check it tripped.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::ExchangeFailure(_)
                | Self::TokenInvalid(_)
                | Self::StateMismatch(_)
                | Self::SubjectMismatch { .. }
                | Self::ProviderDenied { .. }
                | Self::MalformedCallback(_)
        )
    }

    /// Machine code that reaches the browser.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmailNotSet => APIError::EMAIL_NOT_SET,
            Self::EmailNotVerified => APIError::EMAIL_NOT_VERIFIED,
            _ => APIError::LOGIN_FAILED,
        }
    }

    /// User-facing error body.
    pub fn to_api_error(&self) -> APIError {
        match self {
            Self::EmailNotSet => APIError::email_not_set(),
            Self::EmailNotVerified => APIError::email_not_verified(),
            _ => APIError::login_failed(),
        }
    }
}

/// Why a verification email could not be resent.
#[derive(Debug, Error)]
pub enum ResendError {
    #[error("resend token rejected: {0}")]
    TokenInvalid(#[from] TokenError),

    /// The provider no longer accepts the ID token as a bearer.
    #[error("provider session expired")]
    SessionExpired,

    #[error("verification email request failed: {0}")]
    Provider(ProviderError),
}

impl From<ProviderError> for ResendError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Status { status: 401, .. } => Self::SessionExpired,
            other => Self::Provider(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failures_share_generic_code() {
        let errors = [
            LoginError::StateMismatch("abc".into()),
            LoginError::SubjectMismatch {
                profile: "a".into(),
                token: "b".into(),
            },
            LoginError::TokenInvalid(TokenError::MissingKeyId),
            LoginError::ExchangeFailure(ProviderError::Decode("bad".into())),
        ];
        for err in errors {
            assert!(err.is_verification_failure(), "{err}");
            assert_eq!(err.code(), "LOGIN_FAILED");
            assert!(err.to_api_error().engineering_error.is_none());
        }
    }

    #[test]
    fn email_errors_have_distinct_codes() {
        assert_eq!(LoginError::EmailNotSet.code(), "EMAIL_NOT_SET");
        assert_eq!(LoginError::EmailNotVerified.code(), "EMAIL_NOT_VERIFIED");
        assert!(!LoginError::EmailNotSet.is_verification_failure());
    }

    #[test]
    fn infrastructure_errors_are_not_verification_failures() {
        let err = LoginError::from(StoreError::NotFound("account 7".into()));
        assert!(!err.is_verification_failure());
        assert_eq!(err.code(), "LOGIN_FAILED");
    }

    #[test]
    fn provider_unauthorized_means_session_expired() {
        let err = ResendError::from(ProviderError::Status {
            status: 401,
            body: String::new(),
        });
        assert!(matches!(err, ResendError::SessionExpired));

        let err = ResendError::from(ProviderError::Status {
            status: 500,
            body: "boom".into(),
        });
        assert!(matches!(err, ResendError::Provider(_)));
    }
}
