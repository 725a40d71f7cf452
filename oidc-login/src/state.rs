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

//! Shared application state passed to every Axum handler via `State`.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::login::LoginService;

/// HMAC secret of local session tokens.
#[derive(Clone)]
pub struct SessionSecret(pub String);

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub login: Arc<LoginService>,
    pub session_secret: SessionSecret,
    /// Session time-to-live in seconds.
    pub session_ttl_secs: i64,
    /// Cookie domain (e.g. ".example.com"), or `None` for default.
    pub cookie_domain: Option<String>,
    pub cookie_secure: bool,
    /// Home page; failed logins land here.
    pub site_url: String,
}

impl AppState {
    pub fn new(login: Arc<LoginService>, config: &Config) -> Self {
        Self {
            login,
            session_secret: SessionSecret(config.session_secret.clone()),
            session_ttl_secs: config.session_ttl_secs,
            cookie_domain: config.cookie_domain.clone(),
            cookie_secure: config.cookie_secure,
            site_url: config.site_url.clone(),
        }
    }
}

impl FromRef<AppState> for SessionSecret {
    fn from_ref(state: &AppState) -> Self {
        state.session_secret.clone()
    }
}
