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

//! The identity returned by the provider after the code exchange.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ProviderError;

/// Provider tag of database (password-backed) identities.
pub const DATABASE_PROVIDER: &str = "auth0";

/// One identity linked to the external user (a social connection, the
/// provider's own database, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedIdentity {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_social: bool,
}

/// External identity profile. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalProfile {
    /// Unique external subject identifier (`sub`).
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub email_verified: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub identities: Vec<LinkedIdentity>,
    /// Every other claim (name, nickname, custom claims).
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl ExternalProfile {
    /// Build a profile from a userinfo-style JSON object.
    ///
    /// `sub` takes precedence over `user_id` when both are present.
    pub fn from_claims(mut claims: Map<String, Value>) -> Result<Self, ProviderError> {
        let sub = claims.remove("sub");
        let legacy_id = claims.remove("user_id");
        let user_id = match sub.or(legacy_id) {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => return Err(ProviderError::Decode("profile has no subject".to_string())),
        };

        let email = match claims.remove("email") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        };

        let email_verified = match claims.remove("email_verified") {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };

        let identities = match claims.remove("identities") {
            Some(value @ Value::Array(_)) => serde_json::from_value(value)
                .map_err(|e| ProviderError::Decode(format!("invalid identities: {e}")))?,
            _ => Vec::new(),
        };

        Ok(Self {
            user_id,
            email,
            email_verified,
            identities,
            additional: claims,
        })
    }

    /// Parse a profile from an arbitrary JSON value.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        match value {
            Value::Object(map) => Self::from_claims(map),
            other => Err(ProviderError::Decode(format!(
                "expected a JSON object profile, got {other}"
            ))),
        }
    }

    /// Look up a claim by name, typed fields first.
    pub fn claim(&self, key: &str) -> Option<Value> {
        match key {
            "sub" | "user_id" => Some(Value::String(self.user_id.clone())),
            "email" => self.email.clone().map(Value::String),
            "email_verified" => Some(Value::Bool(self.email_verified)),
            "identities" => serde_json::to_value(&self.identities).ok(),
            _ => self.additional.get(key).cloned(),
        }
    }

    /// A claim as a non-empty string, if it is one.
    pub fn claim_str(&self, key: &str) -> Option<String> {
        match self.claim(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    /// True when any linked identity is a database (password-backed) identity.
    pub fn is_database_user(&self) -> bool {
        self.identities
            .iter()
            .any(|identity| identity.provider == DATABASE_PROVIDER)
    }

    /// Copy of this profile carrying the given identities.
    pub fn with_identities(&self, identities: Vec<LinkedIdentity>) -> Self {
        Self {
            identities,
            ..self.clone()
        }
    }

    /// Opaque snapshot persisted on the identity link.
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
