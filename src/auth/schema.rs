//! Runtime discovery of optional columns and tables.
//!
//! Deployments of the restaurant schema drifted over the years: identity
//! columns were added, renamed or kept around as legacy aliases, and the
//! bookkeeping tables (`refresh_tokens`, `password_reset_tokens`) only exist
//! on newer installs. Rather than pinning one layout, the store is probed
//! through `information_schema` and the answers are cached per process.
//!
//! A failed metadata query answers "absent" and is not cached, so a transient
//! store outage neither errors into the caller nor poisons later lookups.

use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{Instrument, info_span, warn};

pub const USERS_TABLE: &str = "users";
pub const REFRESH_TOKENS_TABLE: &str = "refresh_tokens";
pub const PASSWORD_RESET_TOKENS_TABLE: &str = "password_reset_tokens";

pub const EMAIL_COLUMN: &str = "email";
pub const USERNAME_COLUMN: &str = "username";
pub const FIRST_NAME_COLUMN: &str = "first_name";
pub const LAST_NAME_COLUMN: &str = "last_name";
pub const CARD_NUMBER_COLUMN: &str = "card_number";
/// Identifier columns inherited from earlier generations of the schema.
pub const LEGACY_ALIAS_COLUMNS: [&str; 3] = ["login", "identifiant", "identifier"];
/// A deployment may have migrated from one activity scheme to another; any
/// truthy column keeps the account active.
pub const ACTIVITY_COLUMNS: [&str; 3] = ["is_active", "active", "enabled"];
/// Probed in order; the first present column wins.
pub const PASSWORD_COLUMNS: [&str; 3] = ["password_hash", "password", "passwd"];
pub const ROLE_COLUMN: &str = "role";
pub const FAILED_ATTEMPTS_COLUMN: &str = "failed_login_attempts";
pub const LAST_FAILED_LOGIN_COLUMN: &str = "last_failed_login";
pub const LAST_LOGIN_COLUMN: &str = "last_login";

/// Per-process cache of `(table, column) -> exists` and `table -> exists`.
#[derive(Debug, Default)]
pub struct SchemaCache {
    columns: RwLock<HashMap<(String, String), bool>>,
    tables: RwLock<HashMap<String, bool>>,
}

impl SchemaCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One metadata lookup per distinct `(table, column)`; absent on failure.
    pub async fn column_exists(&self, pool: &PgPool, table: &str, column: &str) -> bool {
        let key = (table.to_string(), column.to_string());
        if let Some(known) = self.columns.read().await.get(&key) {
            return *known;
        }

        match probe_column(pool, table, column).await {
            Ok(exists) => {
                self.columns.write().await.insert(key, exists);
                exists
            }
            Err(err) => {
                warn!("Schema probe failed for {table}.{column}: {err}");
                false
            }
        }
    }

    /// One metadata lookup per distinct table; absent on failure.
    pub async fn table_exists(&self, pool: &PgPool, table: &str) -> bool {
        if let Some(known) = self.tables.read().await.get(table) {
            return *known;
        }

        match probe_table(pool, table).await {
            Ok(exists) => {
                self.tables.write().await.insert(table.to_string(), exists);
                exists
            }
            Err(err) => {
                warn!("Schema probe failed for table {table}: {err}");
                false
            }
        }
    }

    /// Drop one cached column answer, e.g. after the store contradicted it.
    pub async fn forget_column(&self, table: &str, column: &str) {
        self.columns
            .write()
            .await
            .remove(&(table.to_string(), column.to_string()));
    }

    pub async fn clear(&self) {
        self.columns.write().await.clear();
        self.tables.write().await.clear();
    }
}

async fn probe_column(pool: &PgPool, table: &str, column: &str) -> Result<bool, sqlx::Error> {
    let query = "SELECT 1 FROM information_schema.columns WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2 LIMIT 1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(table)
        .bind(column)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.is_some())
}

async fn probe_table(pool: &PgPool, table: &str) -> Result<bool, sqlx::Error> {
    let query = "SELECT 1 FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = $1 LIMIT 1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(table)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.is_some())
}

/// Typed snapshot of what the current deployment's schema can do.
///
/// Computed once per pool and injected into the resolver instead of
/// re-probing on every request; `generation` distinguishes re-detections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemaCapabilities {
    pub generation: u64,
    pub email: bool,
    pub username: bool,
    pub first_name: bool,
    pub last_name: bool,
    pub card_number: bool,
    pub legacy_aliases: Vec<String>,
    pub activity_columns: Vec<String>,
    pub password_column: Option<String>,
    pub role: bool,
    pub failed_login_attempts: bool,
    pub last_failed_login: bool,
    pub last_login: bool,
    pub refresh_tokens_table: bool,
    pub password_reset_tokens_table: bool,
}

impl SchemaCapabilities {
    pub async fn detect(pool: &PgPool, cache: &SchemaCache, generation: u64) -> Self {
        let mut legacy_aliases = Vec::new();
        for alias in LEGACY_ALIAS_COLUMNS {
            if cache.column_exists(pool, USERS_TABLE, alias).await {
                legacy_aliases.push(alias.to_string());
            }
        }

        let mut activity_columns = Vec::new();
        for column in ACTIVITY_COLUMNS {
            if cache.column_exists(pool, USERS_TABLE, column).await {
                activity_columns.push(column.to_string());
            }
        }

        let mut password_column = None;
        for column in PASSWORD_COLUMNS {
            if cache.column_exists(pool, USERS_TABLE, column).await {
                password_column = Some(column.to_string());
                break;
            }
        }

        Self {
            generation,
            email: cache.column_exists(pool, USERS_TABLE, EMAIL_COLUMN).await,
            username: cache.column_exists(pool, USERS_TABLE, USERNAME_COLUMN).await,
            first_name: cache
                .column_exists(pool, USERS_TABLE, FIRST_NAME_COLUMN)
                .await,
            last_name: cache
                .column_exists(pool, USERS_TABLE, LAST_NAME_COLUMN)
                .await,
            card_number: cache
                .column_exists(pool, USERS_TABLE, CARD_NUMBER_COLUMN)
                .await,
            legacy_aliases,
            activity_columns,
            password_column,
            role: cache.column_exists(pool, USERS_TABLE, ROLE_COLUMN).await,
            failed_login_attempts: cache
                .column_exists(pool, USERS_TABLE, FAILED_ATTEMPTS_COLUMN)
                .await,
            last_failed_login: cache
                .column_exists(pool, USERS_TABLE, LAST_FAILED_LOGIN_COLUMN)
                .await,
            last_login: cache.column_exists(pool, USERS_TABLE, LAST_LOGIN_COLUMN).await,
            refresh_tokens_table: cache.table_exists(pool, REFRESH_TOKENS_TABLE).await,
            password_reset_tokens_table: cache
                .table_exists(pool, PASSWORD_RESET_TOKENS_TABLE)
                .await,
        }
    }

    /// At least one column the login identifier could match.
    #[must_use]
    pub fn has_identity_column(&self) -> bool {
        self.email
            || self.username
            || self.first_name
            || self.last_name
            || self.card_number
            || !self.legacy_aliases.is_empty()
    }

    /// Lockout needs both the counter and the timestamp to mean anything.
    #[must_use]
    pub fn lockout_supported(&self) -> bool {
        self.failed_login_attempts && self.last_failed_login
    }

    /// Whether login can work at all against this snapshot.
    #[must_use]
    pub fn usable(&self) -> bool {
        self.has_identity_column() && self.password_column.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_capabilities() -> SchemaCapabilities {
        SchemaCapabilities {
            generation: 1,
            email: true,
            username: true,
            first_name: true,
            last_name: true,
            card_number: true,
            legacy_aliases: vec!["login".to_string()],
            activity_columns: vec!["is_active".to_string()],
            password_column: Some("password_hash".to_string()),
            role: true,
            failed_login_attempts: true,
            last_failed_login: true,
            last_login: true,
            refresh_tokens_table: true,
            password_reset_tokens_table: true,
        }
    }

    #[test]
    fn empty_capabilities_are_unusable() {
        let caps = SchemaCapabilities::default();
        assert!(!caps.has_identity_column());
        assert!(!caps.lockout_supported());
        assert!(!caps.usable());
    }

    #[test]
    fn full_capabilities_are_usable() {
        let caps = full_capabilities();
        assert!(caps.has_identity_column());
        assert!(caps.lockout_supported());
        assert!(caps.usable());
    }

    #[test]
    fn identity_via_legacy_alias_only() {
        let caps = SchemaCapabilities {
            legacy_aliases: vec!["identifiant".to_string()],
            password_column: Some("passwd".to_string()),
            ..SchemaCapabilities::default()
        };
        assert!(caps.has_identity_column());
        assert!(caps.usable());
    }

    #[test]
    fn lockout_needs_both_columns() {
        let caps = SchemaCapabilities {
            failed_login_attempts: true,
            ..SchemaCapabilities::default()
        };
        assert!(!caps.lockout_supported());
    }

    #[test]
    fn identity_without_password_column_is_unusable() {
        let caps = SchemaCapabilities {
            email: true,
            ..SchemaCapabilities::default()
        };
        assert!(caps.has_identity_column());
        assert!(!caps.usable());
    }
}
