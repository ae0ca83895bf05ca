//! Account registration, tolerant of the schema variants the resolver knows.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Instrument, error, info_span};
use utoipa::ToSchema;

use crate::auth::{
    AuthState, debug_gate,
    error::{ApiError, ErrorBody},
    password, resolver,
    schema::{SchemaCapabilities, USERS_TABLE},
};

use super::{PASSWORD_MIN_LENGTH, valid_email};

#[derive(ToSchema, Deserialize, Debug)]
pub struct RegisterRequest {
    email: String,
    username: Option<String>,
    password: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct RegisterResponse {
    pub id: String,
    pub email: String,
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Validation error", body = ErrorBody),
        (status = 409, description = "An account with this email or username already exists", body = ErrorBody),
        (status = 500, description = "Configuration or internal error", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let debug_active = debug_gate::is_debug(auth_state.config().environment(), &headers, &query);

    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return ApiError::Validation("Missing payload".to_string()).respond(debug_active);
        }
    };

    let email = request.email.trim().to_lowercase();
    if !valid_email(&email) {
        return ApiError::Validation("Invalid email".to_string()).respond(debug_active);
    }
    if request.password.len() < PASSWORD_MIN_LENGTH {
        return ApiError::Validation("Password too short".to_string()).respond(debug_active);
    }

    let username = request
        .username
        .as_deref()
        .map(resolver::normalize_identifier)
        .filter(|value| !value.is_empty());

    let caps = auth_state.capabilities(&pool).await;
    if !caps.email {
        return ApiError::Configuration("no email column on users".to_string())
            .respond(debug_active);
    }
    let Some(password_column) = caps.password_column.clone() else {
        return ApiError::Configuration("no password column on users".to_string())
            .respond(debug_active);
    };

    let password_hash = match password::hash(&request.password) {
        Ok(password_hash) => password_hash,
        Err(err) => {
            error!("Password hashing failed: {err}");
            return ApiError::Internal("password hashing failed".to_string())
                .respond(debug_active);
        }
    };

    match insert_account(
        &pool,
        &caps,
        &password_column,
        &email,
        username.as_deref(),
        &password_hash,
    )
    .await
    {
        Ok(id) => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                id: id.to_string(),
                email,
            }),
        )
            .into_response(),
        Err(err) if is_unique_violation(&err) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": "Account already exists"})),
        )
            .into_response(),
        Err(err) => {
            error!("Registration failed: {err}");
            ApiError::Dependency(format!("account insert failed: {err}")).respond(debug_active)
        }
    }
}

/// Build the INSERT from whichever columns this deployment has. Activity
/// columns are set truthy so the new account can log in immediately.
async fn insert_account(
    pool: &PgPool,
    caps: &SchemaCapabilities,
    password_column: &str,
    email: &str,
    username: Option<&str>,
    password_hash: &str,
) -> Result<i64, sqlx::Error> {
    let mut columns = vec!["email", password_column];
    let mut binds = vec![email.to_string(), password_hash.to_string()];

    if caps.username {
        if let Some(username) = username {
            columns.push("username");
            binds.push(username.to_string());
        }
    }

    let mut values = (1..=binds.len())
        .map(|position| format!("${position}"))
        .collect::<Vec<_>>();

    for activity_column in &caps.activity_columns {
        columns.push(activity_column.as_str());
        values.push("TRUE".to_string());
    }

    let query = format!(
        "INSERT INTO {USERS_TABLE} ({}) VALUES ({}) RETURNING id::bigint AS id",
        columns.join(", "),
        values.join(", ")
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = %query
    );

    let mut prepared = sqlx::query(&query);
    for bind in &binds {
        prepared = prepared.bind(bind);
    }
    let row = prepared.fetch_one(pool).instrument(span).await?;
    Ok(row.get("id"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
