//! Token bookkeeping SQL for deployments that carry the optional tables.
//!
//! The store only ever sees token hashes, never raw token material. All of
//! these calls are best effort from the callers' point of view; the handlers
//! decide whether a failure is neutral or fatal.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::{Instrument, info_span};

use crate::auth::schema::{PASSWORD_RESET_TOKENS_TABLE, REFRESH_TOKENS_TABLE, USERS_TABLE};

/// Record an issued refresh token for later revocation checks.
pub(crate) async fn record_refresh_token(
    pool: &PgPool,
    account_id: i64,
    token_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let query = format!(
        "INSERT INTO {REFRESH_TOKENS_TABLE} (user_id, token_hash, expires_at) VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = %query
    );
    sqlx::query(&query)
        .bind(account_id)
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to record refresh token")?;
    Ok(())
}

/// Whether a presented refresh token is still on record and unexpired.
pub(crate) async fn refresh_token_known(pool: &PgPool, token_hash: &[u8]) -> Result<bool> {
    let query = format!(
        "SELECT 1 FROM {REFRESH_TOKENS_TABLE} WHERE token_hash = $1 AND expires_at > NOW() LIMIT 1"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query
    );
    let row = sqlx::query(&query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up refresh token")?;
    Ok(row.is_some())
}

/// Drop every recorded refresh token for one account.
pub(crate) async fn delete_refresh_tokens(pool: &PgPool, account_id: i64) -> Result<u64> {
    let query = format!("DELETE FROM {REFRESH_TOKENS_TABLE} WHERE user_id = $1");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = %query
    );
    let result = sqlx::query(&query)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete refresh tokens")?;
    Ok(result.rows_affected())
}

/// Store a password-reset token hash with its expiry.
pub(crate) async fn insert_reset_token(
    pool: &PgPool,
    account_id: i64,
    token_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let query = format!(
        "INSERT INTO {PASSWORD_RESET_TOKENS_TABLE} (user_id, token_hash, expires_at) VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = %query
    );
    sqlx::query(&query)
        .bind(account_id)
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert password reset token")?;
    Ok(())
}

/// Consume a reset token: single use, unexpired. Returns the account id.
pub(crate) async fn consume_reset_token(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<i64>> {
    let query = format!(
        "UPDATE {PASSWORD_RESET_TOKENS_TABLE} SET consumed_at = NOW() WHERE token_hash = $1 AND consumed_at IS NULL AND expires_at > NOW() RETURNING user_id::bigint AS user_id"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = %query
    );
    let row = sqlx::query(&query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume password reset token")?;
    Ok(row.map(|row| row.get("user_id")))
}

/// Overwrite the stored password hash. `password_column` comes from the
/// schema capability snapshot, never from user input.
pub(crate) async fn update_password(
    pool: &PgPool,
    password_column: &str,
    account_id: i64,
    password_hash: &str,
) -> Result<()> {
    let query = format!("UPDATE {USERS_TABLE} SET {password_column} = $1 WHERE id = $2");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = %query
    );
    sqlx::query(&query)
        .bind(password_hash)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}
