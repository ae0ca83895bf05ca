pub(crate) mod csrf;
pub(crate) mod health;
pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod me;
pub(crate) mod password_reset;
pub(crate) mod refresh;
pub(crate) mod register;
pub(crate) mod root;
mod storage;
pub(crate) mod types;

// common functions for the handlers
use axum::response::Response;
use regex::Regex;

use crate::auth::error;

/// Registration and reset passwords must clear this bar; login only checks
/// presence so legacy short passwords keep working.
pub(crate) const PASSWORD_MIN_LENGTH: usize = 8;
pub(crate) const LOGIN_PASSWORD_MIN_LENGTH: usize = 4;

pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// Router fallback for unknown routes.
pub(crate) async fn not_found() -> Response {
    error::not_found_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }
}
