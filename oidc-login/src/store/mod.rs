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

//! Storage collaborators used by the login flow.
//!
//! The account store, the identity-link table, and the per-session nonce list
//! are owned by external systems. The login flow only talks to them through
//! these traits. PostgreSQL implementations live in [`crate::db`]; in-memory
//! implementations live in [`memory`].
//!
//! Implementations must make [`NonceRepository::take`] atomic: a nonce that
//! two concurrent requests race for may be taken by at most one of them.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::login::account::{AccountEdit, AccountId, IdentityLink, LocalAccount, NewAccount};
use crate::login::error::StoreError;

pub use memory::{MemoryAccountStore, MemoryIdentityLinkStore, MemoryNonceRepository};

/// Local user-account storage.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn load(&self, id: AccountId) -> Result<Option<LocalAccount>, StoreError>;

    /// Case-insensitive lookup by email address.
    async fn find_by_email(&self, email: &str) -> Result<Option<LocalAccount>, StoreError>;

    /// Case-insensitive lookup by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<LocalAccount>, StoreError>;

    /// Creates an account. Returns [`StoreError::Conflict`] if the username is taken.
    async fn create(&self, account: NewAccount) -> Result<LocalAccount, StoreError>;

    /// Applies staged attribute and role changes.
    async fn save(&self, id: AccountId, edit: &AccountEdit) -> Result<(), StoreError>;
}

/// The identity-link table, unique on external id.
#[async_trait]
pub trait IdentityLinkStore: Send + Sync {
    async fn find(&self, external_id: &str) -> Result<Option<IdentityLink>, StoreError>;

    /// Inserts a new link. Returns [`StoreError::Conflict`] if the external id
    /// is already linked.
    async fn insert(&self, link: &IdentityLink) -> Result<(), StoreError>;

    /// Replaces the stored profile snapshot.
    async fn update_profile(&self, external_id: &str, profile: &Value) -> Result<(), StoreError>;
}

/// How long an issued nonce stays redeemable.
pub const NONCE_TTL: Duration = Duration::from_secs(10 * 60);

/// Outstanding nonces kept per session. Appending past this drops the oldest.
pub const MAX_OUTSTANDING_NONCES: usize = 16;

/// Result of trying to take a nonce out of a session's outstanding list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceTake {
    /// Found and removed.
    Consumed,
    /// The session has outstanding nonces, but not this one.
    NotFound,
    /// The session has no outstanding nonces at all.
    NoneOutstanding,
}

/// Per-session ordered list of outstanding nonces.
///
/// Nonces older than [`NONCE_TTL`] count as absent everywhere.
#[async_trait]
pub trait NonceRepository: Send + Sync {
    /// Appends a nonce to the end of the session's list, dropping expired
    /// entries and trimming the list to [`MAX_OUTSTANDING_NONCES`].
    async fn append(&self, session_id: &str, nonce: &str) -> Result<(), StoreError>;

    /// Removes exactly one unexpired occurrence of `nonce`, atomically.
    async fn take(&self, session_id: &str, nonce: &str) -> Result<NonceTake, StoreError>;

    /// Unexpired outstanding nonces in issue order.
    async fn outstanding(&self, session_id: &str) -> Result<Vec<String>, StoreError>;
}
