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

//! Axum extractor that authenticates requests with the local session JWT.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};

use crate::error::AppError;
use crate::login::account::AccountId;
use crate::state::SessionSecret;
use crate::token;

/// Name of the cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "session";

/// Value of cookie `name`, if present and non-empty.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// The account behind a valid session token, read from the `session` cookie
/// or an `Authorization: Bearer` header.
///
/// Usage in a handler:
/// ```ignore
/// async fn my_handler(AuthUser { account_id, username }: AuthUser) { ... }
/// ```
#[derive(Debug)]
pub struct AuthUser {
    pub account_id: AccountId,
    pub username: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    SessionSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let SessionSecret(secret) = SessionSecret::from_ref(state);

        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let token = cookie_value(&parts.headers, SESSION_COOKIE)
            .or(bearer)
            .ok_or_else(AppError::unauthorized)?;

        let claims = token::decode_session_token(&secret, token).map_err(|e| {
            tracing::debug!("Rejected session token: {e}");
            AppError::unauthorized()
        })?;
        let account_id = claims
            .sub
            .parse::<AccountId>()
            .map_err(|_| AppError::unauthorized())?;

        Ok(AuthUser {
            account_id,
            username: claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use axum::http::{Request, StatusCode};

    use super::*;
    use crate::login::account::{AccountStatus, LocalAccount};

    const SECRET: &str = "test-session-secret";

    fn session_token() -> String {
        let account = LocalAccount {
            id: 7,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            status: AccountStatus::Active,
            attributes: BTreeMap::new(),
            roles: BTreeSet::new(),
        };
        token::generate_session_token(SECRET, &account, 600).unwrap()
    }

    /// Helper: run the AuthUser extractor against a request with the given headers.
    async fn extract_auth(headers: &[(header::HeaderName, String)]) -> Result<AuthUser, AppError> {
        let mut builder = Request::builder().uri("/test").method("GET");
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        let req = builder.body(()).unwrap();
        let (mut parts, _body) = req.into_parts();
        AuthUser::from_request_parts(&mut parts, &SessionSecret(SECRET.to_string())).await
    }

    #[tokio::test]
    async fn session_cookie_authenticates() {
        let cookie = format!("lang=en; session={}; theme=dark", session_token());
        let auth = extract_auth(&[(header::COOKIE, cookie)])
            .await
            .expect("should succeed");
        assert_eq!(auth.account_id, 7);
        assert_eq!(auth.username, "alice");
    }

    #[tokio::test]
    async fn bearer_header_authenticates() {
        let bearer = format!("Bearer {}", session_token());
        let auth = extract_auth(&[(header::AUTHORIZATION, bearer)])
            .await
            .expect("should succeed");
        assert_eq!(auth.account_id, 7);
    }

    #[tokio::test]
    async fn missing_token_returns_unauthorized() {
        let err = extract_auth(&[]).await.unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.body.code, "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn forged_token_returns_unauthorized() {
        let forged = token::generate_session_token(
            "not-the-secret",
            &LocalAccount {
                id: 1,
                username: "mallory".to_string(),
                email: String::new(),
                status: AccountStatus::Active,
                attributes: BTreeMap::new(),
                roles: BTreeSet::new(),
            },
            600,
        )
        .unwrap();
        let err = extract_auth(&[(header::COOKIE, format!("session={forged}"))])
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn empty_cookie_value_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "session=; login_session=abc".parse().unwrap());
        assert_eq!(cookie_value(&headers, SESSION_COOKIE), None);
        assert_eq!(cookie_value(&headers, "login_session"), Some("abc"));
    }
}
