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

//! Local account view and the durable identity link.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type AccountId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Blocked,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            _ => Self::Blocked,
        }
    }
}

/// In-memory representation of a local account as owned by the account store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalAccount {
    pub id: AccountId,
    pub username: String,
    pub email: String,
    pub status: AccountStatus,
    /// Mapped profile attributes.
    pub attributes: BTreeMap<String, Value>,
    pub roles: BTreeSet<String>,
}

impl LocalAccount {
    /// Current value of an attribute; absent attributes read as the empty string.
    pub fn attribute(&self, key: &str) -> Value {
        self.attributes
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()))
    }

    /// Canonical profile page.
    pub fn profile_path(&self) -> String {
        format!("/user/{}", self.id)
    }
}

/// Everything needed to create an account for a first-time external login.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    /// Argon2 hash of a random password that is never disclosed.
    pub password_hash: String,
    pub status: AccountStatus,
}

/// Staged changes to an account, applied by the account store in one save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountEdit {
    pub attributes: BTreeMap<String, Value>,
    pub roles_granted: BTreeSet<String>,
    pub roles_revoked: BTreeSet<String>,
}

impl AccountEdit {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.roles_granted.is_empty() && self.roles_revoked.is_empty()
    }
}

/// Durable association between an external subject and a local account.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityLink {
    pub external_id: String,
    pub account_id: AccountId,
    /// Last-synced [`super::profile::ExternalProfile`] snapshot.
    pub profile: Value,
}
