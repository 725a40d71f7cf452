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

//! PostgreSQL implementations of the storage traits.
//!
//! Query functions live in the submodules as plain `async fn`s over a
//! [`PgPool`]; [`PgStores`] adapts them to [`crate::store`].

pub mod accounts;
pub mod links;
pub mod nonces;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use crate::login::account::{AccountEdit, AccountId, IdentityLink, LocalAccount, NewAccount};
use crate::login::error::StoreError;
use crate::store::{
    AccountStore, IdentityLinkStore, NonceRepository, NonceTake, MAX_OUTSTANDING_NONCES,
    NONCE_TTL,
};

/// Every store backed by one connection pool.
#[derive(Clone)]
pub struct PgStores {
    pool: PgPool,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map unique violations to [`StoreError::Conflict`].
fn store_error(err: sqlx::Error, what: impl std::fmt::Display) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(what.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl AccountStore for PgStores {
    async fn load(&self, id: AccountId) -> Result<Option<LocalAccount>, StoreError> {
        let row = accounts::get(&self.pool, id).await?;
        Ok(row.map(accounts::AccountRow::into_account))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<LocalAccount>, StoreError> {
        let row = accounts::find_by_email(&self.pool, email).await?;
        Ok(row.map(accounts::AccountRow::into_account))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<LocalAccount>, StoreError> {
        let row = accounts::find_by_username(&self.pool, username).await?;
        Ok(row.map(accounts::AccountRow::into_account))
    }

    async fn create(&self, account: NewAccount) -> Result<LocalAccount, StoreError> {
        let row = accounts::create(
            &self.pool,
            &account.username,
            &account.email,
            &account.password_hash,
            account.status.as_str(),
        )
        .await
        .map_err(|e| store_error(e, format!("username {}", account.username)))?;
        Ok(row.into_account())
    }

    async fn save(&self, id: AccountId, edit: &AccountEdit) -> Result<(), StoreError> {
        let granted: Vec<String> = edit.roles_granted.iter().cloned().collect();
        let revoked: Vec<String> = edit.roles_revoked.iter().cloned().collect();
        let updated =
            accounts::apply_edit(&self.pool, id, &edit.attributes, &granted, &revoked).await?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("account {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityLinkStore for PgStores {
    async fn find(&self, external_id: &str) -> Result<Option<IdentityLink>, StoreError> {
        Ok(links::find(&self.pool, external_id).await?.map(Into::into))
    }

    async fn insert(&self, link: &IdentityLink) -> Result<(), StoreError> {
        links::insert(&self.pool, &link.external_id, link.account_id, &link.profile)
            .await
            .map_err(|e| store_error(e, format!("external id {}", link.external_id)))
    }

    async fn update_profile(&self, external_id: &str, profile: &Value) -> Result<(), StoreError> {
        if links::update_profile(&self.pool, external_id, profile).await? == 0 {
            return Err(StoreError::NotFound(format!("link {external_id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl NonceRepository for PgStores {
    async fn append(&self, session_id: &str, nonce: &str) -> Result<(), StoreError> {
        nonces::append(
            &self.pool,
            session_id,
            nonce,
            NONCE_TTL,
            MAX_OUTSTANDING_NONCES,
        )
        .await?;
        Ok(())
    }

    async fn take(&self, session_id: &str, nonce: &str) -> Result<NonceTake, StoreError> {
        if nonces::delete(&self.pool, session_id, nonce, NONCE_TTL).await? {
            return Ok(NonceTake::Consumed);
        }
        if nonces::any_outstanding(&self.pool, session_id, NONCE_TTL).await? {
            Ok(NonceTake::NotFound)
        } else {
            Ok(NonceTake::NoneOutstanding)
        }
    }

    async fn outstanding(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(nonces::list(&self.pool, session_id, NONCE_TTL).await?)
    }
}
