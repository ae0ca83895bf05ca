//! Authenticated profile endpoint.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::Profile;
use crate::auth::{
    AuthState, bearer, debug_gate,
    error::{ApiError, ErrorBody},
    resolver,
    token::TokenType,
};

#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "The authenticated principal", body = Profile),
        (status = 401, description = "Missing, invalid or expired bearer token", body = ErrorBody)
    ),
    tag = "me"
)]
pub async fn me(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let debug_active = debug_gate::is_debug(auth_state.config().environment(), &headers, &query);

    let Some(token) = bearer::extract_token(&headers, &query) else {
        return ApiError::Authentication.respond(debug_active);
    };

    let claims = match auth_state.keys().verify(&token, TokenType::Access) {
        Ok(claims) => claims,
        Err(err) => {
            debug!("Bearer token rejected: {err}");
            return ApiError::Authentication.respond(debug_active);
        }
    };

    // Fresh store lookup when possible; the claims already carry the
    // principal, so a store failure degrades instead of breaking the call.
    let profile = match claims.sub.parse::<i64>() {
        Ok(account_id) if account_id != debug_gate::STUB_ACCOUNT_ID => {
            let caps = auth_state.capabilities(&pool).await;
            match resolver::fetch_by_id(&pool, &caps, account_id).await {
                Ok(Some(account)) => Profile::from_account(&account),
                Ok(None) => return ApiError::Authentication.respond(debug_active),
                Err(err) => {
                    warn!("Profile re-fetch failed, serving token claims: {err}");
                    Profile::from_claims(&claims)
                }
            }
        }
        _ => Profile::from_claims(&claims),
    };

    (StatusCode::OK, Json(profile)).into_response()
}
