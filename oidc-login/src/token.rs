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

//! Local session token (JWT) signing and validation.
//!
//! A session token is issued once the callback resolves a local account. It is
//! signed with the service's own secret, unrelated to the provider's keys.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use oidc_login_types::SessionTokenClaims;

use crate::error::AppError;
use crate::login::account::LocalAccount;

/// Sign a session token for `account`.
pub fn generate_session_token(
    secret: &str,
    account: &LocalAccount,
    ttl_secs: i64,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let claims = SessionTokenClaims {
        sub: account.id.to_string(),
        username: account.username.clone(),
        exp: now + ttl_secs,
        iss: SessionTokenClaims::ISSUER.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!("Failed to sign session JWT: {e}");
        AppError::internal("failed to generate session token")
    })
}

/// Validate a session token's signature, issuer, and expiry.
pub fn decode_session_token(
    secret: &str,
    token: &str,
) -> Result<SessionTokenClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default();
    validation.set_issuer(&[SessionTokenClaims::ISSUER]);
    decode::<SessionTokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::login::account::AccountStatus;

    const TEST_SECRET: &str = "super-secret-test-key";

    fn account() -> LocalAccount {
        LocalAccount {
            id: 42,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            status: AccountStatus::Active,
            attributes: BTreeMap::new(),
            roles: BTreeSet::new(),
        }
    }

    #[test]
    fn token_round_trips_with_account_claims() {
        let token = generate_session_token(TEST_SECRET, &account(), 600).expect("should sign");
        let claims = decode_session_token(TEST_SECRET, &token).expect("should decode");

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iss, "oidc-login");
    }

    #[test]
    fn exp_is_now_plus_ttl() {
        let ttl = 900_i64;
        let before = Utc::now().timestamp();
        let token = generate_session_token(TEST_SECRET, &account(), ttl).expect("should sign");
        let after = Utc::now().timestamp();

        let claims = decode_session_token(TEST_SECRET, &token).expect("should decode");
        assert!(claims.exp >= before + ttl);
        assert!(claims.exp <= after + ttl);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_session_token(TEST_SECRET, &account(), 600).expect("should sign");
        assert!(decode_session_token("another-secret", &token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = generate_session_token(TEST_SECRET, &account(), -3600).expect("should sign");
        assert!(decode_session_token(TEST_SECRET, &token).is_err());
    }
}
