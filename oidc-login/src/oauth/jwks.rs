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

//! Provider signing keys (JWKS) with rate-limited refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::login::error::TokenError;

/// Minimum interval between JWKS refreshes (5 minutes).
const JWKS_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
struct JwkEntry {
    kid: Option<String>,
    kty: String,
    #[serde(default)]
    alg: Option<String>,
    #[serde(default, rename = "use")]
    key_use: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
    #[serde(default)]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<JwkEntry>,
}

/// Signing keys published at `https://{domain}/.well-known/jwks.json`, keyed by `kid`.
pub struct JwksCache {
    keys: RwLock<HashMap<String, DecodingKey>>,
    jwks_url: String,
    http: reqwest::Client,
    last_refresh: RwLock<Option<Instant>>,
}

impl JwksCache {
    pub fn new(jwks_url: String, http: reqwest::Client) -> Arc<Self> {
        Arc::new(Self {
            keys: RwLock::new(HashMap::new()),
            jwks_url,
            http,
            last_refresh: RwLock::new(None),
        })
    }

    /// Cache pre-loaded with keys; never fetches.
    #[cfg(test)]
    pub fn with_keys(keys: HashMap<String, DecodingKey>) -> Arc<Self> {
        Arc::new(Self {
            keys: RwLock::new(keys),
            jwks_url: String::new(),
            http: reqwest::Client::new(),
            last_refresh: RwLock::new(Some(Instant::now())),
        })
    }

    /// Decoding key for `kid`. An unknown kid triggers a refresh, at most once
    /// per refresh interval.
    pub async fn get_key(&self, kid: &str, alg: Algorithm) -> Result<DecodingKey, TokenError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        self.refresh(alg).await?;

        self.keys
            .read()
            .await
            .get(kid)
            .cloned()
            .ok_or_else(|| TokenError::UnknownKey(kid.to_string()))
    }

    async fn refresh(&self, alg: Algorithm) -> Result<(), TokenError> {
        {
            let last = self.last_refresh.read().await;
            if matches!(*last, Some(at) if at.elapsed() < JWKS_REFRESH_INTERVAL) {
                return Ok(());
            }
        }

        let resp = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| TokenError::Jwks(format!("fetch failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(TokenError::Jwks(format!("HTTP {}", resp.status())));
        }
        let doc: JwksDocument = resp
            .json()
            .await
            .map_err(|e| TokenError::Jwks(format!("invalid document: {e}")))?;

        let mut fresh = HashMap::new();
        for jwk in doc.keys {
            let Some(kid) = jwk.kid.clone() else { continue };
            if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
                continue;
            }
            if jwk.alg.as_deref().is_some_and(|a| a.parse::<Algorithm>().ok() != Some(alg)) {
                debug!(kid = %kid, "skipping JWK for another algorithm");
                continue;
            }
            match decoding_key(&jwk) {
                Some(Ok(key)) => {
                    fresh.insert(kid, key);
                }
                Some(Err(e)) => warn!(kid = %kid, "ignoring malformed JWK: {e}"),
                None => {}
            }
        }

        debug!(count = fresh.len(), url = %self.jwks_url, "refreshed JWKS");
        *self.keys.write().await = fresh;
        *self.last_refresh.write().await = Some(Instant::now());
        Ok(())
    }
}

fn decoding_key(jwk: &JwkEntry) -> Option<Result<DecodingKey, jsonwebtoken::errors::Error>> {
    match jwk.kty.as_str() {
        "RSA" => {
            let (n, e) = (jwk.n.as_deref()?, jwk.e.as_deref()?);
            Some(DecodingKey::from_rsa_components(n, e))
        }
        "EC" => {
            let (x, y) = (jwk.x.as_deref()?, jwk.y.as_deref()?);
            Some(DecodingKey::from_ec_components(x, y))
        }
        _ => None,
    }
}
