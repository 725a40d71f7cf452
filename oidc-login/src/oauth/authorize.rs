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

//! Provider endpoints and the authorize / logout URLs handed to the browser.

use url::Url;

use crate::config::ProviderConfig;

/// Scope requested on every authorization.
pub const SCOPE: &str = "openid profile email";

/// `prompt` value for silent re-authentication against an existing provider session.
pub const PROMPT_NONE: &str = "none";

/// URLs of the provider's endpoints, rooted at `https://{domain}`.
#[derive(Debug, Clone)]
pub struct ProviderEndpoints {
    base: Url,
}

impl ProviderEndpoints {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(base_url)?,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, url::ParseError> {
        Self::new(&config.base_url())
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn join(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn authorize(&self) -> Url {
        self.join(&["authorize"])
    }

    pub fn token(&self) -> Url {
        self.join(&["oauth", "token"])
    }

    pub fn userinfo(&self) -> Url {
        self.join(&["userinfo"])
    }

    pub fn jwks(&self) -> Url {
        self.join(&[".well-known", "jwks.json"])
    }

    pub fn logout(&self) -> Url {
        self.join(&["v2", "logout"])
    }

    /// Management API user record.
    pub fn user(&self, user_id: &str) -> Url {
        self.join(&["api", "v2", "users", user_id])
    }

    pub fn send_verification_email(&self, user_id: &str) -> Url {
        self.join(&["api", "users", user_id, "send_verification_email"])
    }
}

/// Build the authorization URL. `state` carries a freshly issued nonce;
/// `prompt` is `Some("none")` for silent SSO attempts.
pub fn build_authorize_url(
    endpoints: &ProviderEndpoints,
    config: &ProviderConfig,
    state: &str,
    prompt: Option<&str>,
) -> String {
    let mut url = endpoints.authorize();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("client_id", &config.client_id);
        pairs.append_pair("response_type", "code");
        pairs.append_pair("redirect_uri", &config.redirect_url);
        pairs.append_pair("scope", SCOPE);
        pairs.append_pair("state", state);
        if let Some(p) = prompt {
            pairs.append_pair("prompt", p);
        }
    }
    url.to_string()
}

/// Build the provider logout URL.
///
/// With `client_id` the provider ends only this application's session; without
/// it the whole provider session is ended (single sign-out).
pub fn build_logout_url(
    endpoints: &ProviderEndpoints,
    return_to: &str,
    client_id: Option<&str>,
) -> String {
    let mut url = endpoints.logout();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("returnTo", return_to);
        if let Some(id) = client_id {
            pairs.append_pair("client_id", id);
        }
    }
    url.to_string()
}
