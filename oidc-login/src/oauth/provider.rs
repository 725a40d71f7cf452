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

//! Delegated calls to the identity provider: authorization-code exchange,
//! userinfo, management-API identities, and verification emails.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use super::authorize::ProviderEndpoints;
use crate::config::ProviderConfig;
use crate::login::error::ProviderError;
use crate::login::profile::{ExternalProfile, LinkedIdentity};

/// Result of a successful code exchange.
#[derive(Debug, Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    /// Raw, not yet verified, ID token.
    pub id_token: String,
    /// Userinfo profile fetched with the access token.
    pub profile: ExternalProfile,
}

/// Raw response from the token endpoint.
#[derive(Debug, Deserialize, Clone)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ManagementUser {
    #[serde(default)]
    identities: Vec<LinkedIdentity>,
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError>;

    /// Identity records of a user, from the management API.
    async fn fetch_identities(
        &self,
        user_id: &str,
        bearer: &str,
    ) -> Result<Vec<LinkedIdentity>, ProviderError>;

    async fn send_verification_email(&self, user_id: &str, bearer: &str)
        -> Result<(), ProviderError>;
}

/// [`ProviderClient`] over HTTPS. Every request is bounded by the configured timeout.
pub struct HttpProviderClient {
    http: reqwest::Client,
    endpoints: ProviderEndpoints,
    client_id: String,
    client_secret: String,
    redirect_url: String,
}

impl HttpProviderClient {
    pub fn new(
        http: reqwest::Client,
        endpoints: ProviderEndpoints,
        config: &ProviderConfig,
    ) -> Self {
        Self {
            http,
            endpoints,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url: config.redirect_url.clone(),
        }
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<ExternalProfile, ProviderError> {
        let resp = self
            .http
            .get(self.endpoints.userinfo())
            .bearer_auth(access_token)
            .send()
            .await?;
        let body: Value = expect_success(resp).await?.json().await?;
        ExternalProfile::from_value(body)
    }
}

/// Turn a non-2xx response into [`ProviderError::Status`].
async fn expect_success(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_url.as_str()),
        ];

        let resp = self
            .http
            .post(self.endpoints.token())
            .form(&params)
            .send()
            .await?;
        let resp = expect_success(resp).await.inspect_err(|e| {
            error!("OAuth token request failed: {e}");
        })?;

        let tokens: OAuthTokenResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("token response: {e}")))?;
        let id_token = tokens
            .id_token
            .ok_or_else(|| ProviderError::Decode("token response missing id_token".into()))?;

        let profile = self.fetch_userinfo(&tokens.access_token).await?;
        debug!(user_id = %profile.user_id, "exchanged authorization code");

        Ok(ProviderTokens {
            access_token: tokens.access_token,
            id_token,
            profile,
        })
    }

    async fn fetch_identities(
        &self,
        user_id: &str,
        bearer: &str,
    ) -> Result<Vec<LinkedIdentity>, ProviderError> {
        let resp = self
            .http
            .get(self.endpoints.user(user_id))
            .bearer_auth(bearer)
            .send()
            .await?;
        let user: ManagementUser = expect_success(resp)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Decode(format!("management user: {e}")))?;
        Ok(user.identities)
    }

    async fn send_verification_email(
        &self,
        user_id: &str,
        bearer: &str,
    ) -> Result<(), ProviderError> {
        let resp = self
            .http
            .post(self.endpoints.send_verification_email(user_id))
            .bearer_auth(bearer)
            .send()
            .await?;
        expect_success(resp).await?;
        Ok(())
    }
}
