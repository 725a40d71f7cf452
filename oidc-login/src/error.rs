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

//! Application error type that implements Axum's `IntoResponse`.
//!
//! Every error is returned as `APIResponse<APIError>` with `success: false`,
//! paired with the appropriate HTTP status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use oidc_login_types::{APIError, APIResponse};

use crate::login::error::{LoginError, ResendError, StoreError};

/// Application-level error that pairs an HTTP status code with an [`APIError`].
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub body: APIError,
}

impl AppError {
    pub fn new(status: StatusCode, body: APIError) -> Self {
        Self { status, body }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, APIError::unauthorized())
    }

    pub fn internal(detail: &str) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            APIError::internal_error(detail),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = APIResponse::error(self.body);
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Storage error: {err}");
        Self::internal(&err.to_string())
    }
}

impl From<LoginError> for AppError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::Infrastructure(e) => e.into(),
            other => {
                tracing::error!("Login error: {other}");
                Self::new(StatusCode::BAD_REQUEST, other.to_api_error())
            }
        }
    }
}

impl From<ResendError> for AppError {
    fn from(err: ResendError) -> Self {
        match err {
            ResendError::TokenInvalid(_) => {
                Self::new(StatusCode::BAD_REQUEST, APIError::resend_token_invalid())
            }
            ResendError::SessionExpired => {
                Self::new(StatusCode::UNAUTHORIZED, APIError::session_expired())
            }
            ResendError::Provider(e) => {
                tracing::error!("Verification email failed: {e}");
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    APIError::verification_email_failed(&e.to_string()),
                )
            }
        }
    }
}
