//! Forgot/reset password, delegating delivery to the notification sender.
//!
//! `forgot-password` always answers 204 no matter what happened, so the
//! endpoint cannot be used to probe which emails have accounts. The reset
//! token is random, single-use and stored only as a hash; deployments
//! without the `password_reset_tokens` table silently skip the flow.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use super::{PASSWORD_MIN_LENGTH, storage, valid_email};
use crate::auth::{
    AuthState, debug_gate,
    error::{ApiError, ErrorBody},
    password, resolver, token,
};
use crate::notify::Notification;

const RESET_TOKEN_TTL_SECONDS: i64 = 30 * 60;
const RESET_TEMPLATE: &str = "password_reset";

#[derive(ToSchema, Deserialize, Debug)]
pub struct ForgotPasswordRequest {
    email: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    token: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 204, description = "Accepted; a reset message is sent when the account exists")
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ForgotPasswordRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return StatusCode::NO_CONTENT;
    };

    let email = request.email.trim().to_lowercase();
    if !valid_email(&email) {
        return StatusCode::NO_CONTENT;
    }

    let caps = auth_state.capabilities(&pool).await;
    if !caps.password_reset_tokens_table {
        debug!("Password reset table missing; skipping reset flow");
        return StatusCode::NO_CONTENT;
    }

    let account = match resolver::resolve_account(&pool, &caps, &auth_state, &email).await {
        Ok(Some(account)) => account,
        Ok(None) => return StatusCode::NO_CONTENT,
        Err(err) => {
            warn!("Password reset lookup failed: {err}");
            return StatusCode::NO_CONTENT;
        }
    };

    let reset_token = match generate_reset_token() {
        Ok(reset_token) => reset_token,
        Err(err) => {
            error!("Reset token generation failed: {err}");
            return StatusCode::NO_CONTENT;
        }
    };

    let token_hash = token::hash_token(&reset_token);
    if let Err(err) =
        storage::insert_reset_token(&pool, account.id, &token_hash, RESET_TOKEN_TTL_SECONDS).await
    {
        warn!("Reset token not stored for account {}: {err}", account.id);
        return StatusCode::NO_CONTENT;
    }

    let notification = Notification {
        to_email: account.email.unwrap_or(email),
        template: RESET_TEMPLATE.to_string(),
        payload: json!({ "reset_token": reset_token }),
    };
    if let Err(err) = auth_state.notifier().send(&notification) {
        warn!("Reset notification not handed off: {err}");
    }

    StatusCode::NO_CONTENT
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password replaced"),
        (status = 400, description = "Invalid or expired token, or unusable password", body = ErrorBody),
        (status = 503, description = "Store unavailable", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> impl IntoResponse {
    let debug_active = debug_gate::is_debug(auth_state.config().environment(), &headers, &query);

    let request: ResetPasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return ApiError::Validation("Missing payload".to_string()).respond(debug_active);
        }
    };

    let reset_token = request.token.trim();
    if reset_token.is_empty() {
        return ApiError::Validation("Missing token".to_string()).respond(debug_active);
    }
    if request.password.len() < PASSWORD_MIN_LENGTH {
        return ApiError::Validation("Password too short".to_string()).respond(debug_active);
    }

    let caps = auth_state.capabilities(&pool).await;
    if !caps.password_reset_tokens_table {
        return ApiError::Validation("Invalid token".to_string()).respond(debug_active);
    }
    let Some(password_column) = caps.password_column.clone() else {
        return ApiError::Configuration("no password column on users".to_string())
            .respond(debug_active);
    };

    let token_hash = token::hash_token(reset_token);
    let account_id = match storage::consume_reset_token(&pool, &token_hash).await {
        Ok(Some(account_id)) => account_id,
        Ok(None) => {
            return ApiError::Validation("Invalid token".to_string()).respond(debug_active);
        }
        Err(err) => {
            error!("Reset token consumption failed: {err}");
            return ApiError::Dependency(format!("reset token lookup failed: {err}"))
                .respond(debug_active);
        }
    };

    let password_hash = match password::hash(&request.password) {
        Ok(password_hash) => password_hash,
        Err(err) => {
            error!("Password hashing failed: {err}");
            return ApiError::Internal("password hashing failed".to_string())
                .respond(debug_active);
        }
    };

    match storage::update_password(&pool, &password_column, account_id, &password_hash).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Password update failed for account {account_id}: {err}");
            ApiError::Dependency(format!("password update failed: {err}")).respond(debug_active)
        }
    }
}

/// Random 256-bit token; only its hash ever reaches the store.
fn generate_reset_token() -> anyhow::Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| anyhow::anyhow!("failed to generate reset token: {err}"))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
