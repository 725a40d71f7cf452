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

//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use jsonwebtoken::Algorithm;

/// Configuration for the login service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server (e.g. "0.0.0.0:8080").
    pub listen_addr: String,
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Shared secret used to sign local session tokens (HMAC-SHA256).
    pub session_secret: String,
    /// Session time-to-live in seconds (default: 3600).
    pub session_ttl_secs: i64,
    /// Cookie domain (optional, e.g. ".example.com").
    pub cookie_domain: Option<String>,
    /// Whether cookies carry the `Secure` attribute.
    pub cookie_secure: bool,
    /// Base URL of this site. Home page for failures and logout `returnTo`.
    pub site_url: String,
    pub provider: ProviderConfig,
}

/// Identity provider settings and the account-linking policy.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Provider domain, e.g. `tenant.eu.auth0.com`. The issuer is `https://{domain}/`.
    pub domain: String,
    pub client_id: String,
    pub client_secret: String,
    /// Fixed callback URI registered with the provider.
    pub redirect_url: String,
    /// `/login` redirects straight to the provider and logout ends the
    /// provider-wide session.
    pub redirect_for_sso: bool,
    /// The single signature algorithm accepted on ID tokens.
    pub jwt_algorithm: Algorithm,
    /// The client secret is base64url-encoded (HMAC key material).
    pub secret_base64_encoded: bool,
    pub require_verified_email: bool,
    pub username_claim: String,
    /// Claim feeding role mapping. `None` disables role mapping.
    pub role_claim: Option<String>,
    /// Pipe list, one `claim|attribute` per line.
    pub attribute_mapping: String,
    /// Pipe list, one `claim value|role` per line.
    pub role_mapping: String,
    pub join_by_email: bool,
    pub join_by_username: bool,
    /// Upper bound on every outbound provider call.
    pub http_timeout: Duration,
}

impl ProviderConfig {
    /// Expected `iss` claim on ID tokens.
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.domain)
    }

    /// Base URL for every provider endpoint.
    pub fn base_url(&self) -> String {
        format!("https://{}", self.domain)
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Required
    /// - `DATABASE_URL`
    /// - `SESSION_SECRET`
    /// - `OIDC_DOMAIN`, `OIDC_CLIENT_ID`, `OIDC_CLIENT_SECRET`
    ///
    /// # Optional
    /// - `LISTEN_ADDR` (default: `"0.0.0.0:8080"`)
    /// - `SESSION_TTL_SECS` (default: `"3600"`)
    /// - `COOKIE_DOMAIN`, `COOKIE_SECURE` (default: `true`)
    /// - `SITE_URL` (default: `"http://localhost:8080"`)
    /// - `OIDC_REDIRECT_URL` (default: `{SITE_URL}/callback`)
    /// - `OIDC_REDIRECT_FOR_SSO`, `OIDC_JWT_ALGORITHM` (default: `HS256`),
    ///   `OIDC_SECRET_BASE64_ENCODED`, `OIDC_REQUIRE_VERIFIED_EMAIL`,
    ///   `OIDC_USERNAME_CLAIM` (default: `nickname`), `OIDC_ROLE_CLAIM`,
    ///   `OIDC_ATTRIBUTE_MAPPING`, `OIDC_ROLE_MAPPING`, `OIDC_JOIN_BY_EMAIL`,
    ///   `OIDC_JOIN_BY_USERNAME`, `OIDC_HTTP_TIMEOUT_SECS` (default: `10`)
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or(format!("{key} environment variable is required"));

        let database_url = required("DATABASE_URL")?;
        let session_secret = required("SESSION_SECRET")?;
        let listen_addr = var("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let session_ttl_secs = var("SESSION_TTL_SECS")
            .unwrap_or_else(|| "3600".to_string())
            .parse::<i64>()
            .map_err(|_| "SESSION_TTL_SECS must be a valid integer")?;
        let cookie_domain = var("COOKIE_DOMAIN");
        let cookie_secure = parse_flag("COOKIE_SECURE", var("COOKIE_SECURE"), true)?;
        let site_url = var("SITE_URL")
            .unwrap_or_else(|| "http://localhost:8080".to_string())
            .trim_end_matches('/')
            .to_string();

        let jwt_algorithm = var("OIDC_JWT_ALGORITHM")
            .unwrap_or_else(|| "HS256".to_string())
            .parse::<Algorithm>()
            .map_err(|_| "OIDC_JWT_ALGORITHM must be a JWS algorithm such as HS256 or RS256")?;
        let http_timeout_secs = var("OIDC_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u64>()
            .map_err(|_| "OIDC_HTTP_TIMEOUT_SECS must be a valid integer")?;

        let provider = ProviderConfig {
            domain: required("OIDC_DOMAIN")?
                .trim_start_matches("https://")
                .trim_end_matches('/')
                .to_string(),
            client_id: required("OIDC_CLIENT_ID")?,
            client_secret: required("OIDC_CLIENT_SECRET")?,
            redirect_url: var("OIDC_REDIRECT_URL")
                .unwrap_or_else(|| format!("{site_url}/callback")),
            redirect_for_sso: parse_flag(
                "OIDC_REDIRECT_FOR_SSO",
                var("OIDC_REDIRECT_FOR_SSO"),
                false,
            )?,
            jwt_algorithm,
            secret_base64_encoded: parse_flag(
                "OIDC_SECRET_BASE64_ENCODED",
                var("OIDC_SECRET_BASE64_ENCODED"),
                false,
            )?,
            require_verified_email: parse_flag(
                "OIDC_REQUIRE_VERIFIED_EMAIL",
                var("OIDC_REQUIRE_VERIFIED_EMAIL"),
                false,
            )?,
            username_claim: var("OIDC_USERNAME_CLAIM").unwrap_or_else(|| "nickname".to_string()),
            role_claim: var("OIDC_ROLE_CLAIM"),
            attribute_mapping: lookup("OIDC_ATTRIBUTE_MAPPING").unwrap_or_default(),
            role_mapping: lookup("OIDC_ROLE_MAPPING").unwrap_or_default(),
            join_by_email: parse_flag("OIDC_JOIN_BY_EMAIL", var("OIDC_JOIN_BY_EMAIL"), false)?,
            join_by_username: parse_flag(
                "OIDC_JOIN_BY_USERNAME",
                var("OIDC_JOIN_BY_USERNAME"),
                false,
            )?,
            http_timeout: Duration::from_secs(http_timeout_secs),
        };

        Ok(Self {
            listen_addr,
            database_url,
            session_secret,
            session_ttl_secs,
            cookie_domain,
            cookie_secure,
            site_url,
            provider,
        })
    }
}

fn parse_flag(key: &str, value: Option<String>, default: bool) -> Result<bool, String> {
    match value.as_deref().map(str::trim) {
        None => Ok(default),
        Some(v) if v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes") => {
            Ok(true)
        }
        Some(v) if v.eq_ignore_ascii_case("false") || v == "0" || v.eq_ignore_ascii_case("no") => {
            Ok(false)
        }
        Some(_) => Err(format!("{key} must be true or false")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/test"),
            ("SESSION_SECRET", "s3cret"),
            ("OIDC_DOMAIN", "tenant.example.com"),
            ("OIDC_CLIENT_ID", "client-1"),
            ("OIDC_CLIENT_SECRET", "shh"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config, String> {
        Config::from_lookup(|k| env.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = load(&base_env()).expect("should load");
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
        assert_eq!(cfg.session_ttl_secs, 3600);
        assert!(cfg.cookie_secure);
        assert_eq!(cfg.provider.jwt_algorithm, Algorithm::HS256);
        assert_eq!(cfg.provider.username_claim, "nickname");
        assert_eq!(cfg.provider.redirect_url, "http://localhost:8080/callback");
        assert!(cfg.provider.role_claim.is_none());
        assert!(!cfg.provider.join_by_email);
    }

    #[test]
    fn issuer_is_derived_from_domain() {
        let mut env = base_env();
        env.insert("OIDC_DOMAIN", "https://tenant.example.com/");
        let cfg = load(&env).unwrap();
        assert_eq!(cfg.provider.domain, "tenant.example.com");
        assert_eq!(cfg.provider.issuer(), "https://tenant.example.com/");
        assert_eq!(cfg.provider.base_url(), "https://tenant.example.com");
    }

    #[test]
    fn missing_required_variable_is_reported() {
        let mut env = base_env();
        env.remove("OIDC_CLIENT_ID");
        let err = load(&env).unwrap_err();
        assert!(err.contains("OIDC_CLIENT_ID"));
    }

    #[test]
    fn invalid_flag_is_rejected() {
        let mut env = base_env();
        env.insert("OIDC_JOIN_BY_EMAIL", "sometimes");
        assert!(load(&env).is_err());
    }

    #[test]
    fn algorithm_and_flags_are_parsed() {
        let mut env = base_env();
        env.insert("OIDC_JWT_ALGORITHM", "RS256");
        env.insert("OIDC_JOIN_BY_EMAIL", "1");
        env.insert("OIDC_ROLE_CLAIM", "groups");
        env.insert("OIDC_ROLE_MAPPING", "admin|administrator\neditor|content_editor");
        let cfg = load(&env).unwrap();
        assert_eq!(cfg.provider.jwt_algorithm, Algorithm::RS256);
        assert!(cfg.provider.join_by_email);
        assert_eq!(cfg.provider.role_claim.as_deref(), Some("groups"));
        assert!(cfg.provider.role_mapping.contains("content_editor"));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let mut env = base_env();
        env.insert("OIDC_JWT_ALGORITHM", "none");
        assert!(load(&env).is_err());
    }
}
