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

//! The callback orchestrator.
//!
//! [`LoginService`] drives one login attempt from the provider redirect to a
//! resolved local account: code exchange, ID token verification, nonce check,
//! subject cross-check, email policy, then identity linking. Every step must
//! succeed before the next runs; nothing is retried.

use std::sync::Arc;

use tracing::{error, info, warn};

use oidc_login_types::requests::CallbackParams;
use oidc_login_types::responses::LoginWidgetConfig;

use super::account::LocalAccount;
use super::error::{LoginError, ResendError};
use super::events::LoginEvents;
use super::linker::{IdentityLinker, Resolution};
use super::nonce::NonceStore;
use crate::config::ProviderConfig;
use crate::oauth::{
    build_authorize_url, build_logout_url, ProviderClient, ProviderEndpoints, TokenVerifier,
    PROMPT_NONE, SCOPE,
};
use crate::store::{AccountStore, IdentityLinkStore, NonceRepository};

/// Provider error that asks for silent re-authentication.
const LOGIN_REQUIRED: &str = "login_required";

/// External systems the login flow talks to.
pub struct Collaborators {
    pub accounts: Arc<dyn AccountStore>,
    pub links: Arc<dyn IdentityLinkStore>,
    pub nonces: Arc<dyn NonceRepository>,
    pub provider: Arc<dyn ProviderClient>,
    pub events: Arc<dyn LoginEvents>,
}

/// What the callback handler should do next.
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    /// The provider session is gone; retry silently with `prompt=none`.
    Reauthenticate { authorize_url: String },
    /// Start a local session for `account` and redirect to `redirect_to`.
    LoggedIn {
        account: LocalAccount,
        resolution: Resolution,
        redirect_to: String,
    },
    /// Email must be verified first; `id_token` authorizes a resend.
    VerifyEmail { id_token: String },
}

pub struct LoginService {
    config: Arc<ProviderConfig>,
    endpoints: ProviderEndpoints,
    verifier: TokenVerifier,
    nonces: NonceStore,
    provider: Arc<dyn ProviderClient>,
    events: Arc<dyn LoginEvents>,
    linker: IdentityLinker,
}

impl LoginService {
    pub fn new(
        config: Arc<ProviderConfig>,
        endpoints: ProviderEndpoints,
        verifier: TokenVerifier,
        collaborators: Collaborators,
    ) -> Self {
        let linker = IdentityLinker::new(
            collaborators.accounts,
            collaborators.links,
            collaborators.provider.clone(),
            collaborators.events.clone(),
            &config,
        );
        Self {
            endpoints,
            verifier,
            nonces: NonceStore::new(collaborators.nonces),
            provider: collaborators.provider,
            events: collaborators.events,
            linker,
            config,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Issue a nonce for `session_id` and build the authorize URL carrying it.
    pub async fn authorize_url(
        &self,
        session_id: &str,
        prompt: Option<&str>,
    ) -> Result<String, LoginError> {
        let state = self.nonces.issue(session_id).await?;
        Ok(build_authorize_url(
            &self.endpoints,
            &self.config,
            &state,
            prompt,
        ))
    }

    /// Everything a front-end login widget needs, with a freshly issued state.
    pub async fn login_widget(&self, session_id: &str) -> Result<LoginWidgetConfig, LoginError> {
        let state = self.nonces.issue(session_id).await?;
        let authorize_url = build_authorize_url(&self.endpoints, &self.config, &state, None);
        Ok(LoginWidgetConfig {
            domain: self.config.domain.clone(),
            client_id: self.config.client_id.clone(),
            callback_url: self.config.redirect_url.clone(),
            scope: SCOPE.to_string(),
            response_type: "code".to_string(),
            state,
            authorize_url,
        })
    }

    /// Provider logout URL. In SSO mode the client id is left out so that the
    /// whole provider session ends.
    pub fn logout_url(&self, return_to: &str) -> String {
        let client_id = if self.config.redirect_for_sso {
            None
        } else {
            Some(self.config.client_id.as_str())
        };
        build_logout_url(&self.endpoints, return_to, client_id)
    }

    /// Run the callback sequence for the browser session `session_id`.
    pub async fn handle_callback(
        &self,
        session_id: &str,
        params: &CallbackParams,
    ) -> Result<CallbackOutcome, LoginError> {
        if let Some(err) = params.error.as_deref() {
            if err == LOGIN_REQUIRED {
                info!(session_id, "provider session required, retrying silently");
                let authorize_url = self.authorize_url(session_id, Some(PROMPT_NONE)).await?;
                return Ok(CallbackOutcome::Reauthenticate { authorize_url });
            }
            return Err(LoginError::ProviderDenied {
                error: err.to_string(),
                description: params.error_description.clone().unwrap_or_default(),
            });
        }

        let code = params
            .code
            .as_deref()
            .ok_or(LoginError::MalformedCallback("code"))?;
        let state = params
            .state
            .as_deref()
            .ok_or(LoginError::MalformedCallback("state"))?;

        let tokens = self
            .provider
            .exchange_code(code)
            .await
            .map_err(LoginError::ExchangeFailure)?;

        let claims = self.verifier.verify(&tokens.id_token).await?;

        if !self.nonces.consume(session_id, state).await? {
            return Err(LoginError::StateMismatch(state.to_string()));
        }

        let profile = tokens.profile;
        if profile.user_id != claims.sub {
            return Err(LoginError::SubjectMismatch {
                profile: profile.user_id,
                token: claims.sub,
            });
        }

        self.events.pre_login(&profile);

        if self.config.require_verified_email {
            if profile.email.is_none() {
                return Err(LoginError::EmailNotSet);
            }
            if !profile.email_verified {
                warn!(external_id = %profile.user_id, "email not verified");
                return Ok(CallbackOutcome::VerifyEmail {
                    id_token: tokens.id_token,
                });
            }
        }

        let outcome = match self.linker.resolve(&profile, &tokens.id_token).await {
            Ok(outcome) => outcome,
            Err(LoginError::EmailNotVerified) => {
                return Ok(CallbackOutcome::VerifyEmail {
                    id_token: tokens.id_token,
                })
            }
            Err(e) => return Err(e),
        };

        let redirect_to = params
            .destination
            .as_deref()
            .filter(|d| is_local_path(d))
            .map(str::to_string)
            .unwrap_or_else(|| outcome.account.profile_path());

        info!(
            external_id = %profile.user_id,
            account_id = outcome.account.id,
            resolution = ?outcome.resolution,
            "login succeeded, redirecting to {redirect_to}"
        );
        Ok(CallbackOutcome::LoggedIn {
            account: outcome.account,
            resolution: outcome.resolution,
            redirect_to,
        })
    }

    /// Resend the verification email for the subject of `id_token`.
    pub async fn resend_verification(&self, id_token: &str) -> Result<(), ResendError> {
        let claims = self.verifier.verify(id_token).await.inspect_err(|e| {
            error!("resend verification with an invalid token: {e}");
        })?;
        self.provider
            .send_verification_email(&claims.sub, id_token)
            .await?;
        info!(external_id = %claims.sub, "verification email sent");
        Ok(())
    }
}

/// Destinations must stay on this site.
fn is_local_path(destination: &str) -> bool {
    destination.starts_with('/')
        && !destination.starts_with("//")
        && destination.chars().all(|c| c.is_ascii_graphic() && c != '\\')
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use async_trait::async_trait;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde_json::json;

    use super::*;
    use crate::login::error::ProviderError;
    use crate::login::profile::{ExternalProfile, LinkedIdentity};
    use crate::oauth::{JwksCache, ProviderTokens};
    use crate::store::{MemoryAccountStore, MemoryIdentityLinkStore, MemoryNonceRepository};

    const SECRET: &str = "client-secret";

    struct FakeProvider {
        id_token: String,
        profile: serde_json::Value,
        resend_status: Option<u16>,
        resent: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl ProviderClient for FakeProvider {
        async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, ProviderError> {
            if code != "good-code" {
                return Err(ProviderError::Status {
                    status: 403,
                    body: "invalid_grant".into(),
                });
            }
            Ok(ProviderTokens {
                access_token: "at".into(),
                id_token: self.id_token.clone(),
                profile: ExternalProfile::from_value(self.profile.clone())?,
            })
        }

        async fn fetch_identities(
            &self,
            _user_id: &str,
            _bearer: &str,
        ) -> Result<Vec<LinkedIdentity>, ProviderError> {
            Ok(Vec::new())
        }

        async fn send_verification_email(
            &self,
            user_id: &str,
            _bearer: &str,
        ) -> Result<(), ProviderError> {
            if let Some(status) = self.resend_status {
                return Err(ProviderError::Status {
                    status,
                    body: String::new(),
                });
            }
            self.resent.lock().unwrap().push(user_id.to_string());
            Ok(())
        }
    }

    fn config() -> ProviderConfig {
        ProviderConfig {
            domain: "tenant.example.com".to_string(),
            client_id: "client123".to_string(),
            client_secret: SECRET.to_string(),
            redirect_url: "https://app.example.com/callback".to_string(),
            redirect_for_sso: false,
            jwt_algorithm: Algorithm::HS256,
            secret_base64_encoded: false,
            require_verified_email: false,
            username_claim: "nickname".to_string(),
            role_claim: None,
            attribute_mapping: String::new(),
            role_mapping: String::new(),
            join_by_email: true,
            join_by_username: false,
            http_timeout: Duration::from_secs(5),
        }
    }

    fn id_token(sub: &str) -> String {
        let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 600;
        let claims = json!({
            "iss": "https://tenant.example.com/",
            "aud": "client123",
            "sub": sub,
            "exp": exp,
        });
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    struct Harness {
        service: LoginService,
        nonces: Arc<MemoryNonceRepository>,
        accounts: Arc<MemoryAccountStore>,
        provider: Arc<FakeProvider>,
    }

    fn harness_with(config: ProviderConfig, provider: FakeProvider) -> Harness {
        let config = Arc::new(config);
        let accounts = Arc::new(MemoryAccountStore::new());
        let nonces = Arc::new(MemoryNonceRepository::new());
        let provider = Arc::new(provider);
        let verifier =
            TokenVerifier::from_config(&config, JwksCache::with_keys(HashMap::new())).unwrap();
        let endpoints = ProviderEndpoints::from_config(&config).unwrap();
        let service = LoginService::new(
            config,
            endpoints,
            verifier,
            Collaborators {
                accounts: accounts.clone(),
                links: Arc::new(MemoryIdentityLinkStore::new()),
                nonces: nonces.clone(),
                provider: provider.clone(),
                events: Arc::new(crate::login::events::TracingLoginEvents),
            },
        );
        Harness {
            service,
            nonces,
            accounts,
            provider,
        }
    }

    fn provider(sub: &str, profile: serde_json::Value) -> FakeProvider {
        FakeProvider {
            id_token: id_token(sub),
            profile,
            resend_status: None,
            resent: StdMutex::new(Vec::new()),
        }
    }

    fn harness() -> Harness {
        harness_with(
            config(),
            provider(
                "auth0|1",
                json!({"sub": "auth0|1", "email": "a@x.com", "email_verified": true, "nickname": "alice"}),
            ),
        )
    }

    fn callback(state: &str, code: &str) -> CallbackParams {
        CallbackParams {
            state: Some(state.to_string()),
            code: Some(code.to_string()),
            ..Default::default()
        }
    }

    async fn issue_state(h: &Harness, session: &str) -> String {
        let url = h.service.authorize_url(session, None).await.unwrap();
        url::Url::parse(&url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn successful_callback_creates_account_and_redirects_to_profile() {
        let h = harness();
        let state = issue_state(&h, "sess").await;

        let outcome = h
            .service
            .handle_callback("sess", &callback(&state, "good-code"))
            .await
            .unwrap();

        match outcome {
            CallbackOutcome::LoggedIn {
                account,
                resolution,
                redirect_to,
            } => {
                assert_eq!(resolution, Resolution::Created);
                assert_eq!(account.username, "alice");
                assert_eq!(redirect_to, format!("/user/{}", account.id));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(h.nonces.outstanding("sess").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replayed_state_is_rejected() {
        let h = harness();
        let state = issue_state(&h, "sess").await;
        let params = callback(&state, "good-code");

        h.service.handle_callback("sess", &params).await.unwrap();
        let err = h.service.handle_callback("sess", &params).await.unwrap_err();
        assert!(matches!(err, LoginError::StateMismatch(_)));
    }

    #[tokio::test]
    async fn state_from_another_session_is_rejected() {
        let h = harness();
        let state = issue_state(&h, "sess-a").await;

        let err = h
            .service
            .handle_callback("sess-b", &callback(&state, "good-code"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::StateMismatch(_)));
        assert_eq!(h.nonces.outstanding("sess-a").await.unwrap(), vec![state]);
        assert!(h.accounts.is_empty().await);
    }

    #[tokio::test]
    async fn subject_mismatch_is_rejected() {
        let h = harness_with(
            config(),
            provider("auth0|other", json!({"sub": "auth0|1", "email": "a@x.com"})),
        );
        let state = issue_state(&h, "sess").await;

        let err = h
            .service
            .handle_callback("sess", &callback(&state, "good-code"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::SubjectMismatch { .. }));
        assert!(err.is_verification_failure());
        assert!(h.accounts.is_empty().await);
    }

    #[tokio::test]
    async fn failed_exchange_is_a_verification_failure() {
        let h = harness();
        let state = issue_state(&h, "sess").await;

        let err = h
            .service
            .handle_callback("sess", &callback(&state, "bad-code"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::ExchangeFailure(_)));
        assert_eq!(err.code(), "LOGIN_FAILED");
    }

    #[tokio::test]
    async fn token_with_wrong_audience_is_rejected() {
        let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 600;
        let token = encode(
            &Header::new(Algorithm::HS256),
            &json!({"iss": "https://tenant.example.com/", "aud": "someone-else", "sub": "auth0|1", "exp": exp}),
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        let mut fake = provider("auth0|1", json!({"sub": "auth0|1"}));
        fake.id_token = token;
        let h = harness_with(config(), fake);
        let state = issue_state(&h, "sess").await;

        let err = h
            .service
            .handle_callback("sess", &callback(&state, "good-code"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::TokenInvalid(_)));
        assert!(h.accounts.is_empty().await);
    }

    #[tokio::test]
    async fn login_required_triggers_silent_reauthentication() {
        let h = harness();
        let params = CallbackParams {
            error: Some("login_required".to_string()),
            ..Default::default()
        };

        let outcome = h.service.handle_callback("sess", &params).await.unwrap();
        match outcome {
            CallbackOutcome::Reauthenticate { authorize_url } => {
                assert!(authorize_url.contains("prompt=none"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(h.nonces.outstanding("sess").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn other_provider_errors_fail_the_login() {
        let h = harness();
        let params = CallbackParams {
            error: Some("access_denied".to_string()),
            error_description: Some("user cancelled".to_string()),
            ..Default::default()
        };
        let err = h.service.handle_callback("sess", &params).await.unwrap_err();
        assert!(matches!(err, LoginError::ProviderDenied { .. }));
    }

    #[tokio::test]
    async fn missing_email_fails_when_verification_required() {
        let h = harness_with(
            ProviderConfig {
                require_verified_email: true,
                ..config()
            },
            provider("twitter|5", json!({"sub": "twitter|5"})),
        );
        let state = issue_state(&h, "sess").await;

        let err = h
            .service
            .handle_callback("sess", &callback(&state, "good-code"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoginError::EmailNotSet));
    }

    #[tokio::test]
    async fn unverified_email_asks_for_verification() {
        let h = harness_with(
            ProviderConfig {
                require_verified_email: true,
                ..config()
            },
            provider(
                "auth0|1",
                json!({"sub": "auth0|1", "email": "a@x.com", "email_verified": false}),
            ),
        );
        let state = issue_state(&h, "sess").await;

        let outcome = h
            .service
            .handle_callback("sess", &callback(&state, "good-code"))
            .await
            .unwrap();
        assert!(matches!(outcome, CallbackOutcome::VerifyEmail { .. }));
        assert!(h.accounts.is_empty().await);
    }

    #[tokio::test]
    async fn local_destination_is_honoured() {
        let h = harness();
        let state = issue_state(&h, "sess").await;
        let params = CallbackParams {
            destination: Some("/dashboard".to_string()),
            ..callback(&state, "good-code")
        };

        match h.service.handle_callback("sess", &params).await.unwrap() {
            CallbackOutcome::LoggedIn { redirect_to, .. } => assert_eq!(redirect_to, "/dashboard"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn external_destination_falls_back_to_profile() {
        let h = harness();
        let state = issue_state(&h, "sess").await;
        let params = CallbackParams {
            destination: Some("//evil.example.com".to_string()),
            ..callback(&state, "good-code")
        };

        match h.service.handle_callback("sess", &params).await.unwrap() {
            CallbackOutcome::LoggedIn {
                redirect_to,
                account,
                ..
            } => assert_eq!(redirect_to, account.profile_path()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn destination_must_be_a_plain_site_path() {
        assert!(is_local_path("/node/5?tab=edit"));
        assert!(!is_local_path("//evil.example.com"));
        assert!(!is_local_path("/\\evil.example.com"));
        assert!(!is_local_path("/foo\nbar"));
        assert!(!is_local_path("/caf\u{e9}"));
        assert!(!is_local_path("https://evil.example.com"));
    }

    #[test]
    fn logout_url_omits_client_id_in_sso_mode() {
        let h = harness();
        assert!(h
            .service
            .logout_url("https://app.example.com")
            .contains("client_id=client123"));

        let h = harness_with(
            ProviderConfig {
                redirect_for_sso: true,
                ..config()
            },
            provider("auth0|1", json!({"sub": "auth0|1"})),
        );
        assert!(!h
            .service
            .logout_url("https://app.example.com")
            .contains("client_id"));
    }

    #[tokio::test]
    async fn login_widget_carries_an_outstanding_state() {
        let h = harness();
        let widget = h.service.login_widget("sess").await.unwrap();
        assert_eq!(widget.scope, "openid profile email");
        assert!(widget.authorize_url.contains(&widget.state));
        assert_eq!(
            h.nonces.outstanding("sess").await.unwrap(),
            vec![widget.state]
        );
    }

    #[tokio::test]
    async fn resend_uses_token_subject() {
        let h = harness();
        h.service
            .resend_verification(&id_token("auth0|1"))
            .await
            .unwrap();
        assert_eq!(*h.provider.resent.lock().unwrap(), vec!["auth0|1"]);

        let err = h
            .service
            .resend_verification("not-a-token")
            .await
            .unwrap_err();
        assert!(matches!(err, ResendError::TokenInvalid(_)));
    }

    #[tokio::test]
    async fn resend_with_expired_provider_session() {
        let mut fake = provider("auth0|1", json!({"sub": "auth0|1"}));
        fake.resend_status = Some(401);
        let h = harness_with(config(), fake);

        let err = h
            .service
            .resend_verification(&id_token("auth0|1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResendError::SessionExpired));
    }
}
