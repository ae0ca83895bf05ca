//! Logout: best-effort revocation of recorded refresh tokens.
//!
//! Access tokens are stateless and cannot be revoked; what logout can do is
//! drop the caller's recorded refresh tokens on deployments that keep them.
//! The endpoint never fails the caller.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage;
use crate::auth::{AuthState, bearer, token::TokenType};

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    if let Some(token) = bearer::extract_token(&headers, &query) {
        // Either token type identifies the account.
        let claims = auth_state
            .keys()
            .verify(&token, TokenType::Access)
            .or_else(|_| auth_state.keys().verify(&token, TokenType::Refresh));

        if let Ok(claims) = claims {
            if let Ok(account_id) = claims.sub.parse::<i64>() {
                let caps = auth_state.capabilities(&pool).await;
                if caps.refresh_tokens_table {
                    match storage::delete_refresh_tokens(&pool, account_id).await {
                        Ok(dropped) => {
                            debug!("Dropped {dropped} refresh tokens for account {account_id}");
                        }
                        Err(err) => {
                            warn!("Refresh token cleanup failed for account {account_id}: {err}");
                        }
                    }
                }
            }
        }
    }

    StatusCode::NO_CONTENT
}
