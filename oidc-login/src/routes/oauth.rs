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

//! Login route handlers: login, callback, email verification resend, session,
//! profile, logout.
//!
//! A successful callback issues a **signed session JWT** inside an
//! `HttpOnly; SameSite=Lax` cookie named `session`. The login nonces are scoped
//! by a separate random `login_session` cookie, created by `/login` only. It is
//! `SameSite=None` on secure deployments so the provider's cross-site form post
//! to `/callback` still carries it.

use axum::{
    extract::{Form, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use oidc_login_types::requests::{CallbackParams, VerifyEmailRequest};
use oidc_login_types::responses::{EmailVerificationPrompt, MessageResponse, ProfileResponse};
use oidc_login_types::{APIError, APIResponse};
use uuid::Uuid;

use crate::auth::{cookie_value, AuthUser, SESSION_COOKIE};
use crate::error::AppError;
use crate::login::{CallbackOutcome, LoginError};
use crate::state::AppState;
use crate::token;

/// Cookie scoping the outstanding login nonces of one browser.
pub const LOGIN_SESSION_COOKIE: &str = "login_session";

/// Where the email-verification prompt posts the ID token back to.
pub const VERIFY_EMAIL_PATH: &str = "/verify_email";

// ---------------------------------------------------------------------------
// Cookie helpers
// ---------------------------------------------------------------------------

fn cookie_attributes(cookie: &mut String, domain: Option<&str>, secure: bool) {
    if secure {
        cookie.push_str("; Secure");
    }
    if let Some(d) = domain {
        cookie.push_str(&format!("; Domain={d}"));
    }
}

/// Build a `Set-Cookie` header value for the session JWT.
fn build_session_cookie(jwt: &str, ttl_secs: i64, domain: Option<&str>, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={jwt}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_secs}");
    cookie_attributes(&mut cookie, domain, secure);
    cookie
}

/// Build a `Set-Cookie` header that clears the `session` cookie.
fn build_clear_session_cookie(domain: Option<&str>, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    cookie_attributes(&mut cookie, domain, secure);
    cookie
}

/// Build a browser-session `Set-Cookie` header for the login session id.
///
/// Browsers drop `SameSite=None` without `Secure`, so plain-HTTP deployments
/// fall back to `Lax` and support only the query callback.
fn build_login_session_cookie(id: &str, domain: Option<&str>, secure: bool) -> String {
    let same_site = if secure { "None" } else { "Lax" };
    let mut cookie = format!("{LOGIN_SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite={same_site}");
    cookie_attributes(&mut cookie, domain, secure);
    cookie
}

fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Invalid Set-Cookie value: {e}"),
    }
}

/// The login session id from the request, or a new one with the cookie that
/// starts it.
fn login_session(state: &AppState, headers: &HeaderMap) -> (String, Option<String>) {
    match cookie_value(headers, LOGIN_SESSION_COOKIE) {
        Some(id) => (id.to_string(), None),
        None => {
            let id = Uuid::new_v4().to_string();
            let cookie =
                build_login_session_cookie(&id, state.cookie_domain.as_deref(), state.cookie_secure);
            (id, Some(cookie))
        }
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /login
///
/// In SSO mode redirects to the provider. Otherwise returns the login widget
/// configuration with a freshly issued state.
pub async fn login(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let (session_id, new_cookie) = login_session(&state, &headers);

    let mut response = if state.login.config().redirect_for_sso {
        let url = state.login.authorize_url(&session_id, None).await?;
        Redirect::to(&url).into_response()
    } else {
        let widget = state.login.login_widget(&session_id).await?;
        Json(APIResponse::ok(widget)).into_response()
    };

    if let Some(cookie) = new_cookie {
        append_cookie(&mut response, &cookie);
    }
    Ok(response)
}

/// GET /callback?code=...&state=...
pub async fn callback_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    callback(state, headers, params).await
}

/// POST /callback (form post response mode)
pub async fn callback_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(params): Form<CallbackParams>,
) -> Response {
    callback(state, headers, params).await
}

async fn callback(state: AppState, headers: HeaderMap, params: CallbackParams) -> Response {
    let Some(session_id) = cookie_value(&headers, LOGIN_SESSION_COOKIE) else {
        let nonce = params.state.unwrap_or_default();
        return fail_login(&state, LoginError::StateMismatch(nonce));
    };

    match state.login.handle_callback(session_id, &params).await {
        Ok(CallbackOutcome::Reauthenticate { authorize_url }) => {
            Redirect::to(&authorize_url).into_response()
        }
        Ok(CallbackOutcome::LoggedIn {
            account,
            redirect_to,
            ..
        }) => {
            let jwt = match token::generate_session_token(
                &state.session_secret.0,
                &account,
                state.session_ttl_secs,
            ) {
                Ok(jwt) => jwt,
                Err(e) => return e.into_response(),
            };
            let cookie = build_session_cookie(
                &jwt,
                state.session_ttl_secs,
                state.cookie_domain.as_deref(),
                state.cookie_secure,
            );
            let mut response = Redirect::to(&redirect_to).into_response();
            append_cookie(&mut response, &cookie);
            response
        }
        Ok(CallbackOutcome::VerifyEmail { id_token }) => {
            let err = APIError::email_not_verified();
            let prompt = EmailVerificationPrompt {
                code: err.code,
                message: err.message,
                id_token,
                resend_path: VERIFY_EMAIL_PATH.to_string(),
            };
            (StatusCode::FORBIDDEN, Json(APIResponse::failed(prompt))).into_response()
        }
        Err(e) => fail_login(&state, e),
    }
}

/// Abort a login attempt: log the cause, drop the local session, and log out
/// at the provider, which returns the browser home with a machine-readable
/// error code.
fn fail_login(state: &AppState, err: LoginError) -> Response {
    if err.is_verification_failure() {
        tracing::error!("Login verification failed: {err}");
    } else {
        tracing::error!("Login failed: {err}");
    }

    let home = format!("{}/?login_error={}", state.site_url, err.code());
    let clear = build_clear_session_cookie(state.cookie_domain.as_deref(), state.cookie_secure);
    let mut response = Redirect::to(&state.login.logout_url(&home)).into_response();
    append_cookie(&mut response, &clear);
    response
}

/// POST /verify_email (form field `idToken`)
pub async fn verify_email(
    State(state): State<AppState>,
    Form(body): Form<VerifyEmailRequest>,
) -> Result<Json<APIResponse<MessageResponse>>, AppError> {
    state.login.resend_verification(&body.id_token).await?;
    Ok(Json(APIResponse::ok(MessageResponse {
        message: "An authorization email was sent to your account".to_string(),
    })))
}

/// GET /session -- returns 200 if the session JWT is valid, 401 otherwise.
pub async fn check_session(AuthUser { .. }: AuthUser) -> StatusCode {
    StatusCode::OK
}

/// GET /profile -- the account id and username from the session JWT claims.
pub async fn get_profile(
    AuthUser {
        account_id,
        username,
    }: AuthUser,
) -> Json<APIResponse<ProfileResponse>> {
    Json(APIResponse::ok(ProfileResponse {
        account_id,
        username,
    }))
}

/// GET /logout -- clears the session cookie and redirects to the provider's
/// logout endpoint, which returns the browser to the site.
pub async fn logout(State(state): State<AppState>) -> Response {
    let clear = build_clear_session_cookie(state.cookie_domain.as_deref(), state.cookie_secure);
    let mut response = Redirect::to(&state.login.logout_url(&state.site_url)).into_response();
    append_cookie(&mut response, &clear);
    response
}
