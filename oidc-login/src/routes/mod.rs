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

//! Axum router configuration for the login service.

pub mod oauth;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

/// Build the full application router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(oauth::login))
        .route(
            "/callback",
            get(oauth::callback_get).post(oauth::callback_post),
        )
        .route("/verify_email", post(oauth::verify_email))
        .route("/session", get(oauth::check_session))
        .route("/profile", get(oauth::get_profile))
        .route("/logout", get(oauth::logout))
}
