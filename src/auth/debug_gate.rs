//! Environment-gated debug mode and the reachability stub identity.
//!
//! Debug mode is on for any non-production deployment, or in production when
//! the caller sets an explicit toggle. While active, the login path accepts
//! one reserved identifier/password pair without touching the store, strictly
//! to validate routing and token issuance, and error responses may carry
//! internal detail.

use axum::http::HeaderMap;
use std::collections::HashMap;
use std::str::FromStr;

use super::resolver::{Account, Role};

pub const STUB_IDENTIFIER: &str = "demo";
pub const STUB_PASSWORD: &str = "demo123";
pub const STUB_ACCOUNT_ID: i64 = 0;
pub const STUB_EMAIL: &str = "demo@tavola.test";

const DEBUG_HEADER: &str = "x-debug";
const DEBUG_QUERY_PARAM: &str = "debug";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "staging" | "test" => Ok(Self::Development),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// True outside production, or when the caller toggles it explicitly.
#[must_use]
pub fn is_debug(
    environment: Environment,
    headers: &HeaderMap,
    query: &HashMap<String, String>,
) -> bool {
    if !environment.is_production() {
        return true;
    }

    headers
        .get(DEBUG_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(is_truthy)
        || query
            .get(DEBUG_QUERY_PARAM)
            .map(String::as_str)
            .is_some_and(is_truthy)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// The identifier is compared after normalization, the password verbatim.
#[must_use]
pub fn matches_stub(normalized_identifier: &str, password: &str) -> bool {
    normalized_identifier == STUB_IDENTIFIER && password == STUB_PASSWORD
}

/// Synthetic profile used by the stub login; never persisted.
#[must_use]
pub fn stub_account() -> Account {
    Account {
        id: STUB_ACCOUNT_ID,
        email: Some(STUB_EMAIL.to_string()),
        username: Some(STUB_IDENTIFIER.to_string()),
        role: Role::User,
        password_hash: None,
        failed_login_attempts: 0,
        last_failed_login: None,
        last_login: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn no_query() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn non_production_is_always_debug() {
        assert!(is_debug(
            Environment::Development,
            &HeaderMap::new(),
            &no_query()
        ));
    }

    #[test]
    fn production_without_toggle_is_not_debug() {
        assert!(!is_debug(
            Environment::Production,
            &HeaderMap::new(),
            &no_query()
        ));
    }

    #[test]
    fn production_header_toggle() {
        let mut headers = HeaderMap::new();
        headers.insert("x-debug", HeaderValue::from_static("1"));
        assert!(is_debug(Environment::Production, &headers, &no_query()));

        let mut headers = HeaderMap::new();
        headers.insert("x-debug", HeaderValue::from_static("off"));
        assert!(!is_debug(Environment::Production, &headers, &no_query()));
    }

    #[test]
    fn production_query_toggle() {
        let mut query = HashMap::new();
        query.insert("debug".to_string(), "true".to_string());
        assert!(is_debug(Environment::Production, &HeaderMap::new(), &query));

        let mut query = HashMap::new();
        query.insert("debug".to_string(), "0".to_string());
        assert!(!is_debug(
            Environment::Production,
            &HeaderMap::new(),
            &query
        ));
    }

    #[test]
    fn environment_parsing() {
        assert_eq!(
            "production".parse::<Environment>(),
            Ok(Environment::Production)
        );
        assert_eq!("Dev".parse::<Environment>(), Ok(Environment::Development));
        assert_eq!(
            "staging".parse::<Environment>(),
            Ok(Environment::Development)
        );
        assert!("weird".parse::<Environment>().is_err());
    }

    #[test]
    fn stub_match_uses_normalized_identifier() {
        assert!(matches_stub("demo", "demo123"));
        assert!(!matches_stub("demo", "demo1234"));
        assert!(!matches_stub("demo2", "demo123"));
    }

    #[test]
    fn stub_account_shape() {
        let account = stub_account();
        assert_eq!(account.id, STUB_ACCOUNT_ID);
        assert_eq!(account.email.as_deref(), Some(STUB_EMAIL));
        assert_eq!(account.role, Role::User);
        assert!(account.password_hash.is_none());
    }
}
