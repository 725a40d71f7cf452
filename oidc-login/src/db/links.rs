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

//! Identity link queries.

use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::login::account::{AccountId, IdentityLink};

#[derive(Debug, sqlx::FromRow)]
pub struct LinkRow {
    pub external_id: String,
    pub account_id: i64,
    pub profile: Json<Value>,
}

impl From<LinkRow> for IdentityLink {
    fn from(row: LinkRow) -> Self {
        Self {
            external_id: row.external_id,
            account_id: row.account_id,
            profile: row.profile.0,
        }
    }
}

pub async fn find(pool: &PgPool, external_id: &str) -> Result<Option<LinkRow>, sqlx::Error> {
    sqlx::query_as::<_, LinkRow>(
        "SELECT external_id, account_id, profile FROM identity_links WHERE external_id = $1",
    )
    .bind(external_id)
    .fetch_optional(pool)
    .await
}

/// Insert a link. An already-linked external id fails with a unique violation.
pub async fn insert(
    pool: &PgPool,
    external_id: &str,
    account_id: AccountId,
    profile: &Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO identity_links (external_id, account_id, profile)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(external_id)
    .bind(account_id)
    .bind(Json(profile))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_profile(
    pool: &PgPool,
    external_id: &str,
    profile: &Value,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE identity_links
        SET profile = $2, updated_at = CURRENT_TIMESTAMP
        WHERE external_id = $1
        "#,
    )
    .bind(external_id)
    .bind(Json(profile))
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
