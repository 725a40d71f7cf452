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

//! Per-session login nonce queries.
//!
//! Expiry is evaluated against `issued_at` with the TTL passed in seconds, so
//! an expired row is invisible to every query even before it is pruned.

use std::time::Duration;

use sqlx::PgPool;

/// Insert a nonce, drop every expired row, and trim the session to its
/// `keep` newest nonces.
pub async fn append(
    pool: &PgPool,
    session_id: &str,
    nonce: &str,
    ttl: Duration,
    keep: usize,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "DELETE FROM session_nonces WHERE issued_at <= clock_timestamp() - make_interval(secs => $1)",
    )
    .bind(ttl.as_secs_f64())
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO session_nonces (session_id, nonce)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(session_id)
    .bind(nonce)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        DELETE FROM session_nonces
        WHERE session_id = $1
          AND nonce IN (
              SELECT nonce FROM session_nonces
              WHERE session_id = $1
              ORDER BY issued_at DESC, nonce DESC
              OFFSET $2
          )
        "#,
    )
    .bind(session_id)
    .bind(i64::try_from(keep).unwrap_or(i64::MAX))
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

/// Delete one unexpired nonce. Returns whether it was present.
pub async fn delete(
    pool: &PgPool,
    session_id: &str,
    nonce: &str,
    ttl: Duration,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        DELETE FROM session_nonces
        WHERE session_id = $1 AND nonce = $2
          AND issued_at > clock_timestamp() - make_interval(secs => $3)
        "#,
    )
    .bind(session_id)
    .bind(nonce)
    .bind(ttl.as_secs_f64())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn any_outstanding(
    pool: &PgPool,
    session_id: &str,
    ttl: Duration,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM session_nonces
            WHERE session_id = $1
              AND issued_at > clock_timestamp() - make_interval(secs => $2)
        )
        "#,
    )
    .bind(session_id)
    .bind(ttl.as_secs_f64())
    .fetch_one(pool)
    .await
}

/// Unexpired nonces, oldest first.
pub async fn list(pool: &PgPool, session_id: &str, ttl: Duration) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT nonce FROM session_nonces
        WHERE session_id = $1
          AND issued_at > clock_timestamp() - make_interval(secs => $2)
        ORDER BY issued_at, nonce
        "#,
    )
    .bind(session_id)
    .bind(ttl.as_secs_f64())
    .fetch_all(pool)
    .await
}
