//! Failed-login lockout state machine.
//!
//! Lockout is derived, not stored: an account is locked while its failure
//! counter has reached the limit and the last failure is younger than the
//! window. The counter increment happens in the store so concurrent failed
//! attempts against one account cannot under-count.
//!
//! The tracker never blocks an otherwise-successful authentication due to its
//! own failure: read and write errors are logged and treated as "not locked".

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{Instrument, info_span, warn};

use super::resolver::Account;
use super::schema::{SchemaCapabilities, USERS_TABLE};

pub const DEFAULT_MAX_FAILED_ATTEMPTS: i32 = 5;
pub const DEFAULT_LOCKOUT_SECONDS: i64 = 15 * 60;

#[derive(Clone, Copy, Debug)]
pub struct LockoutPolicy {
    pub max_attempts: i32,
    pub lockout_seconds: i64,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
        }
    }
}

impl LockoutPolicy {
    #[must_use]
    pub const fn new(max_attempts: i32, lockout_seconds: i64) -> Self {
        Self {
            max_attempts,
            lockout_seconds,
        }
    }

    /// Locked iff the counter reached the limit and the window has not
    /// elapsed. Accounts with no recorded failure timestamp are never locked.
    #[must_use]
    pub fn is_locked(&self, account: &Account, now: DateTime<Utc>) -> bool {
        if account.failed_login_attempts < self.max_attempts {
            return false;
        }
        match account.last_failed_login {
            Some(last_failed) => now - last_failed < Duration::seconds(self.lockout_seconds),
            None => false,
        }
    }
}

/// Count one failed attempt and stamp its time. Best effort.
pub async fn record_failure(pool: &PgPool, caps: &SchemaCapabilities, account_id: i64) {
    if !caps.lockout_supported() {
        return;
    }

    let query = format!(
        "UPDATE {USERS_TABLE} SET failed_login_attempts = failed_login_attempts + 1, last_failed_login = NOW() WHERE id = $1"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = %query
    );
    if let Err(err) = sqlx::query(&query)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
    {
        warn!("Failed to record failed login for account {account_id}: {err}");
    }
}

/// Reset the failure counter and stamp the successful login. Best effort.
pub async fn record_success(pool: &PgPool, caps: &SchemaCapabilities, account_id: i64) {
    let mut assignments = Vec::new();
    if caps.failed_login_attempts {
        assignments.push("failed_login_attempts = 0");
    }
    if caps.last_failed_login {
        assignments.push("last_failed_login = NULL");
    }
    if caps.last_login {
        assignments.push("last_login = NOW()");
    }
    if assignments.is_empty() {
        return;
    }

    let query = format!(
        "UPDATE {USERS_TABLE} SET {} WHERE id = $1",
        assignments.join(", ")
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = %query
    );
    if let Err(err) = sqlx::query(&query)
        .bind(account_id)
        .execute(pool)
        .instrument(span)
        .await
    {
        warn!("Failed to reset lockout state for account {account_id}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::resolver::Role;

    fn account(failed_attempts: i32, last_failed_seconds_ago: Option<i64>) -> Account {
        let now = Utc::now();
        Account {
            id: 1,
            email: Some("jane@x.com".to_string()),
            username: None,
            role: Role::User,
            password_hash: None,
            failed_login_attempts: failed_attempts,
            last_failed_login: last_failed_seconds_ago.map(|ago| now - Duration::seconds(ago)),
            last_login: None,
        }
    }

    #[test]
    fn below_limit_is_open() {
        let policy = LockoutPolicy::default();
        let account = account(DEFAULT_MAX_FAILED_ATTEMPTS - 1, Some(1));
        assert!(!policy.is_locked(&account, Utc::now()));
    }

    #[test]
    fn at_limit_within_window_is_locked() {
        let policy = LockoutPolicy::default();
        let account = account(DEFAULT_MAX_FAILED_ATTEMPTS, Some(1));
        assert!(policy.is_locked(&account, Utc::now()));
    }

    #[test]
    fn above_limit_within_window_is_locked() {
        let policy = LockoutPolicy::default();
        let account = account(DEFAULT_MAX_FAILED_ATTEMPTS + 3, Some(60));
        assert!(policy.is_locked(&account, Utc::now()));
    }

    #[test]
    fn lock_expires_after_window() {
        let policy = LockoutPolicy::default();
        let account = account(DEFAULT_MAX_FAILED_ATTEMPTS, Some(DEFAULT_LOCKOUT_SECONDS + 1));
        assert!(!policy.is_locked(&account, Utc::now()));
    }

    #[test]
    fn missing_timestamp_is_open() {
        let policy = LockoutPolicy::default();
        let account = account(DEFAULT_MAX_FAILED_ATTEMPTS + 1, None);
        assert!(!policy.is_locked(&account, Utc::now()));
    }

    #[test]
    fn reset_state_is_open() {
        // The state a successful authentication writes back: counter zeroed,
        // timestamp cleared. Checking lockout right after must say open.
        let policy = LockoutPolicy::default();
        let account = account(0, None);
        assert!(!policy.is_locked(&account, Utc::now()));
    }

    #[test]
    fn custom_policy_boundaries() {
        let policy = LockoutPolicy::new(3, 60);
        assert!(!policy.is_locked(&account(2, Some(1)), Utc::now()));
        assert!(policy.is_locked(&account(3, Some(1)), Utc::now()));
        assert!(!policy.is_locked(&account(3, Some(61)), Utc::now()));
    }
}
