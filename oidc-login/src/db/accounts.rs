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

//! Local account queries.

use std::collections::BTreeMap;

use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::login::account::{AccountId, AccountStatus, LocalAccount};

#[derive(Debug, sqlx::FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub status: String,
    pub attributes: Json<BTreeMap<String, Value>>,
    pub roles: Vec<String>,
}

impl AccountRow {
    pub fn into_account(self) -> LocalAccount {
        LocalAccount {
            id: self.id,
            username: self.username,
            email: self.email,
            status: AccountStatus::parse(&self.status),
            attributes: self.attributes.0,
            roles: self.roles.into_iter().collect(),
        }
    }
}

const COLUMNS: &str = "id, username, email, status, attributes, roles";

pub async fn get(pool: &PgPool, id: AccountId) -> Result<Option<AccountRow>, sqlx::Error> {
    sqlx::query_as::<_, AccountRow>(&format!("SELECT {COLUMNS} FROM accounts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Oldest account with this email, compared case-insensitively.
pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<AccountRow>, sqlx::Error> {
    sqlx::query_as::<_, AccountRow>(&format!(
        "SELECT {COLUMNS} FROM accounts WHERE lower(email) = lower($1) ORDER BY id LIMIT 1"
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<AccountRow>, sqlx::Error> {
    sqlx::query_as::<_, AccountRow>(&format!(
        "SELECT {COLUMNS} FROM accounts WHERE lower(username) = lower($1)"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

/// Insert an account. A taken username fails with a unique violation.
pub async fn create(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
    status: &str,
) -> Result<AccountRow, sqlx::Error> {
    sqlx::query_as::<_, AccountRow>(&format!(
        r#"
        INSERT INTO accounts (username, email, password_hash, status)
        VALUES ($1, $2, $3, $4)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(status)
    .fetch_one(pool)
    .await
}

/// Merge `attributes` into the stored attributes and apply role changes.
/// Returns the number of rows updated.
pub async fn apply_edit(
    pool: &PgPool,
    id: AccountId,
    attributes: &BTreeMap<String, Value>,
    granted: &[String],
    revoked: &[String],
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE accounts
        SET attributes = attributes || $2,
            roles = ARRAY(
                SELECT r FROM unnest(roles) AS r WHERE NOT (r = ANY($4))
                UNION
                SELECT unnest($3::text[])
            )
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(Json(attributes))
    .bind(granted)
    .bind(revoked)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
