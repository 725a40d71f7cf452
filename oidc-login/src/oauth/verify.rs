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

//! ID token verification policy.
//!
//! A token is trusted only when its header algorithm is the one configured,
//! its signature checks out against the algorithm-appropriate key (the client
//! secret for HMAC, the provider JWKS otherwise), `iss` is `https://{domain}/`,
//! `aud` contains the client id, and it has not expired.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::jwks::JwksCache;
use crate::config::ProviderConfig;
use crate::login::error::TokenError;

/// Verified claims of an ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    /// A single string or an array of strings.
    pub aud: Value,
    pub exp: u64,
    /// Algorithm the token was signed with. Filled in after verification.
    #[serde(skip)]
    pub alg: Option<Algorithm>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

enum KeySource {
    Secret(DecodingKey),
    Jwks(Arc<JwksCache>),
}

pub struct TokenVerifier {
    issuer: String,
    audience: String,
    algorithm: Algorithm,
    keys: KeySource,
}

impl TokenVerifier {
    /// Build a verifier for the configured provider. HMAC algorithms use the
    /// client secret; every other algorithm resolves keys through `jwks`.
    pub fn from_config(config: &ProviderConfig, jwks: Arc<JwksCache>) -> Result<Self, TokenError> {
        let keys = if is_hmac(config.jwt_algorithm) {
            KeySource::Secret(hmac_key(&config.client_secret, config.secret_base64_encoded)?)
        } else {
            KeySource::Jwks(jwks)
        };
        Ok(Self {
            issuer: config.issuer(),
            audience: config.client_id.clone(),
            algorithm: config.jwt_algorithm,
            keys,
        })
    }

    pub async fn verify(&self, id_token: &str) -> Result<IdTokenClaims, TokenError> {
        let header = decode_header(id_token)?;
        if header.alg != self.algorithm {
            return Err(TokenError::AlgorithmMismatch {
                expected: self.algorithm,
                found: header.alg,
            });
        }

        let key = match &self.keys {
            KeySource::Secret(key) => key.clone(),
            KeySource::Jwks(jwks) => {
                let kid = header.kid.as_deref().ok_or(TokenError::MissingKeyId)?;
                jwks.get_key(kid, self.algorithm).await?
            }
        };

        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.validate_exp = true;

        let mut claims = decode::<IdTokenClaims>(id_token, &key, &validation)?.claims;
        claims.alg = Some(header.alg);
        Ok(claims)
    }
}

fn is_hmac(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// HMAC key material. Base64-encoded secrets use the URL-safe alphabet; the
/// standard alphabet and padding are tolerated.
fn hmac_key(secret: &str, base64_encoded: bool) -> Result<DecodingKey, TokenError> {
    if !base64_encoded {
        return Ok(DecodingKey::from_secret(secret.as_bytes()));
    }
    let normalized: String = secret
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    Ok(DecodingKey::from_secret(&URL_SAFE_NO_PAD.decode(normalized)?))
}
