//! Credential resolution against a schema that varies across deployments.
//!
//! The login identifier is matched with one OR clause per identity column the
//! current deployment actually has, case-insensitively for textual columns,
//! plus `"first last"` / `"last first"` concatenations when both name columns
//! exist and an exact match for loyalty-card numbers. At most one row is
//! selected; when the predicate could match several logical accounts the
//! first row wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span, warn};
use unicode_normalization::UnicodeNormalization;

use super::error::ApiError;
use super::schema::{SchemaCapabilities, USERS_TABLE};
use super::state::AuthState;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
    Manager,
}

impl Role {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "manager" => Self::Manager,
            _ => Self::User,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Manager => "manager",
        }
    }
}

/// One resolved account row; optional fields mirror optional columns.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: i64,
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Role,
    pub password_hash: Option<String>,
    pub failed_login_attempts: i32,
    pub last_failed_login: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Normalize a login identifier: NFKC, trim, Unicode lowercase, collapse
/// internal whitespace runs to one space.
#[must_use]
pub fn normalize_identifier(raw: &str) -> String {
    let folded = raw.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A fully built lookup: SQL text plus its positional text binds.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct LookupQuery {
    pub sql: String,
    pub binds: Vec<String>,
    pub has_activity_filter: bool,
}

fn select_list(caps: &SchemaCapabilities) -> String {
    // Casts keep row decoding uniform across integer widths and enum columns.
    let mut columns = vec!["id::bigint AS id".to_string()];
    if let Some(password_column) = &caps.password_column {
        columns.push(format!("{password_column}::text AS password_hash"));
    }
    if caps.email {
        columns.push("email::text AS email".to_string());
    }
    if caps.username {
        columns.push("username::text AS username".to_string());
    }
    if caps.role {
        columns.push("role::text AS role".to_string());
    }
    if caps.failed_login_attempts {
        columns.push("failed_login_attempts::int AS failed_login_attempts".to_string());
    }
    if caps.last_failed_login {
        columns.push("last_failed_login::timestamptz AS last_failed_login".to_string());
    }
    if caps.last_login {
        columns.push("last_login::timestamptz AS last_login".to_string());
    }
    columns.join(", ")
}

/// Build the OR-combined lookup; every clause gets its own placeholder.
///
/// Returns `None` when no identity column is available on this deployment.
pub(crate) fn build_lookup_query(
    caps: &SchemaCapabilities,
    normalized: &str,
    raw: &str,
    include_activity: bool,
) -> Option<LookupQuery> {
    let mut clauses: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    let text_clause = |column: &str, clauses: &mut Vec<String>, binds: &mut Vec<String>| {
        clauses.push(format!("LOWER({column}::text) = ${}", binds.len() + 1));
        binds.push(normalized.to_string());
    };

    if caps.email {
        text_clause("email", &mut clauses, &mut binds);
    }
    if caps.username {
        text_clause("username", &mut clauses, &mut binds);
    }
    if caps.first_name {
        text_clause("first_name", &mut clauses, &mut binds);
    }
    if caps.last_name {
        text_clause("last_name", &mut clauses, &mut binds);
    }
    for alias in &caps.legacy_aliases {
        text_clause(alias, &mut clauses, &mut binds);
    }
    if caps.first_name && caps.last_name {
        clauses.push(format!(
            "LOWER(first_name::text || ' ' || last_name::text) = ${}",
            binds.len() + 1
        ));
        binds.push(normalized.to_string());
        clauses.push(format!(
            "LOWER(last_name::text || ' ' || first_name::text) = ${}",
            binds.len() + 1
        ));
        binds.push(normalized.to_string());
    }
    if caps.card_number {
        // Card numbers are literal tokens: exact match on the raw input.
        clauses.push(format!("card_number::text = ${}", binds.len() + 1));
        binds.push(raw.to_string());
    }

    if clauses.is_empty() {
        return None;
    }

    let mut sql = format!(
        "SELECT {} FROM {USERS_TABLE} WHERE ({})",
        select_list(caps),
        clauses.join(" OR ")
    );

    let has_activity_filter = include_activity && !caps.activity_columns.is_empty();
    if has_activity_filter {
        let activity = caps
            .activity_columns
            .iter()
            .map(|column| format!("COALESCE({column}::int, 0) <> 0"))
            .collect::<Vec<_>>()
            .join(" OR ");
        sql.push_str(&format!(" AND ({activity})"));
    }

    sql.push_str(" LIMIT 1");

    Some(LookupQuery {
        sql,
        binds,
        has_activity_filter,
    })
}

/// Resolve a login identifier to at most one account.
///
/// # Errors
/// `Configuration` when the deployment has no usable identity or password
/// column; `Dependency` when the store fails for any other reason than the
/// drift fallback below.
pub async fn resolve_account(
    pool: &PgPool,
    caps: &SchemaCapabilities,
    state: &AuthState,
    raw_identifier: &str,
) -> Result<Option<Account>, ApiError> {
    if caps.password_column.is_none() {
        return Err(ApiError::Configuration(
            "no password column on users".to_string(),
        ));
    }

    let normalized = normalize_identifier(raw_identifier);
    let Some(query) = build_lookup_query(caps, &normalized, raw_identifier, true) else {
        return Err(ApiError::Configuration(
            "no identity columns on users".to_string(),
        ));
    };

    match run_lookup(pool, &query).await {
        Ok(row) => Ok(row.map(|row| account_from_row(&row))),
        Err(err) if query.has_activity_filter && is_undefined_column(&err) => {
            // Schema drift: the cached activity columns no longer exist on
            // this instance. Retry once without the activity clause and
            // force re-detection for later requests.
            warn!("Activity filter referenced a missing column, retrying without it: {err}");
            state.invalidate_capabilities().await;
            let Some(retry) = build_lookup_query(caps, &normalized, raw_identifier, false) else {
                return Err(ApiError::Configuration(
                    "no identity columns on users".to_string(),
                ));
            };
            match run_lookup(pool, &retry).await {
                Ok(row) => Ok(row.map(|row| account_from_row(&row))),
                Err(err) => Err(store_error(&err)),
            }
        }
        Err(err) => Err(store_error(&err)),
    }
}

/// Fetch one account by primary key using the same capability-driven columns.
///
/// # Errors
/// `Dependency` when the store is unreachable or the query fails.
pub async fn fetch_by_id(
    pool: &PgPool,
    caps: &SchemaCapabilities,
    account_id: i64,
) -> Result<Option<Account>, ApiError> {
    let sql = format!(
        "SELECT {} FROM {USERS_TABLE} WHERE id = $1 LIMIT 1",
        select_list(caps)
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %sql
    );
    let row = sqlx::query(&sql)
        .bind(account_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(|err| store_error(&err))?;
    Ok(row.map(|row| account_from_row(&row)))
}

async fn run_lookup(pool: &PgPool, query: &LookupQuery) -> Result<Option<PgRow>, sqlx::Error> {
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = %query.sql
    );
    let mut prepared = sqlx::query(&query.sql);
    for bind in &query.binds {
        prepared = prepared.bind(bind);
    }
    prepared.fetch_optional(pool).instrument(span).await
}

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.try_get::<i64, _>("id").unwrap_or_default(),
        email: row.try_get::<Option<String>, _>("email").ok().flatten(),
        username: row.try_get::<Option<String>, _>("username").ok().flatten(),
        role: row
            .try_get::<Option<String>, _>("role")
            .ok()
            .flatten()
            .map_or(Role::User, |value| Role::parse(&value)),
        password_hash: row
            .try_get::<Option<String>, _>("password_hash")
            .ok()
            .flatten(),
        failed_login_attempts: row
            .try_get::<Option<i32>, _>("failed_login_attempts")
            .ok()
            .flatten()
            .unwrap_or(0),
        last_failed_login: row
            .try_get::<Option<DateTime<Utc>>, _>("last_failed_login")
            .ok()
            .flatten(),
        last_login: row
            .try_get::<Option<DateTime<Utc>>, _>("last_login")
            .ok()
            .flatten(),
    }
}

fn store_error(err: &sqlx::Error) -> ApiError {
    ApiError::Dependency(format!("account lookup failed: {err}"))
}

fn is_undefined_column(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "42703"),
        _ => false,
    }
}
