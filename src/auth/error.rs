//! Error taxonomy for the authentication surface.
//!
//! Authentication failures are deliberately uniform: "no such account" and
//! "wrong password" produce the same response so callers cannot enumerate
//! accounts. Detailed diagnostics only leave the process when the debug gate
//! is active.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Configuration(String),
    #[error("invalid credentials")]
    Authentication,
    #[error("insufficient permissions")]
    Forbidden,
    #[error("account temporarily locked")]
    Locked,
    #[error("{0}")]
    Dependency(String),
    #[error("{0}")]
    Internal(String),
}

/// JSON error envelope returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Locked => StatusCode::TOO_MANY_REQUESTS,
            Self::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message; internals stay generic regardless of debug mode.
    fn public_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Configuration(_) => "Server configuration error".to_string(),
            Self::Authentication => "Invalid credentials".to_string(),
            Self::Forbidden => "Forbidden".to_string(),
            Self::Locked => "Too many failed attempts".to_string(),
            Self::Dependency(_) => "Service temporarily unavailable".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    fn hint(&self) -> Option<String> {
        match self {
            Self::Locked => Some("Retry after the lockout window elapses".to_string()),
            _ => None,
        }
    }

    /// Build the HTTP response; `debug` attaches the internal detail.
    #[must_use]
    pub fn respond(&self, debug: bool) -> Response {
        let details = if debug {
            match self {
                Self::Configuration(detail)
                | Self::Dependency(detail)
                | Self::Internal(detail) => Some(detail.clone()),
                _ => None,
            }
        } else {
            None
        };

        let body = ErrorBody {
            error: self.public_message(),
            details,
            hint: self.hint(),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Router fallback for unknown routes, same envelope as everything else.
#[must_use]
pub fn not_found_response() -> Response {
    let body = ErrorBody {
        error: "Not found".to_string(),
        details: None,
        hint: None,
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(
            ApiError::Validation("x".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Configuration("x".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ApiError::Authentication.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Locked.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::Dependency("x".to_string()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Internal("x".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn authentication_message_is_uniform() {
        assert_eq!(
            ApiError::Authentication.public_message(),
            "Invalid credentials"
        );
    }

    #[test]
    fn internals_stay_generic_without_debug() {
        let err = ApiError::Dependency("connection refused on 5432".to_string());
        assert_eq!(err.public_message(), "Service temporarily unavailable");
    }
}
