//! Response types shared across the auth handlers.

use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::resolver::Account;
use crate::auth::token::Claims;

pub(crate) const BEARER_TOKEN_TYPE: &str = "Bearer";

/// Verified principal surfaced to callers and downstream endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub role: String,
}

impl Profile {
    #[must_use]
    pub fn from_account(account: &Account) -> Self {
        Self {
            id: account.id.to_string(),
            email: account.email.clone(),
            role: account.role.as_str().to_string(),
        }
    }

    #[must_use]
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            id: claims.sub.clone(),
            email: Some(claims.email.clone()).filter(|email| !email.is_empty()),
            role: claims.role.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: Profile,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::resolver::Role;
    use crate::auth::token::TokenType;
    use chrono::Utc;

    #[test]
    fn profile_from_account() {
        let account = Account {
            id: 42,
            email: Some("jane@x.com".to_string()),
            username: None,
            role: Role::Manager,
            password_hash: None,
            failed_login_attempts: 0,
            last_failed_login: None,
            last_login: None,
        };
        let profile = Profile::from_account(&account);
        assert_eq!(profile.id, "42");
        assert_eq!(profile.email.as_deref(), Some("jane@x.com"));
        assert_eq!(profile.role, "manager");
    }

    #[test]
    fn profile_from_claims_drops_empty_email() {
        let claims = Claims {
            sub: "7".to_string(),
            email: String::new(),
            role: "user".to_string(),
            token_type: TokenType::Access,
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 60,
        };
        let profile = Profile::from_claims(&claims);
        assert_eq!(profile.id, "7");
        assert!(profile.email.is_none());
    }
}
