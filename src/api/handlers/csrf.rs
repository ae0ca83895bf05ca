//! CSRF token issuance: random value returned as JSON and as a cookie.

use axum::{
    Json,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::IntoResponse,
};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::auth::error::ApiError;

const CSRF_COOKIE_NAME: &str = "csrf_token";

#[derive(ToSchema, Serialize, Debug)]
pub struct CsrfResponse {
    pub csrf_token: String,
}

#[utoipa::path(
    get,
    path = "/v1/csrf-token",
    responses(
        (status = 200, description = "Fresh CSRF token", body = CsrfResponse)
    ),
    tag = "csrf"
)]
pub async fn csrf_token() -> impl IntoResponse {
    let token = match generate_csrf_token() {
        Ok(token) => token,
        Err(err) => {
            error!("CSRF token generation failed: {err}");
            return ApiError::Internal("token generation failed".to_string()).respond(false);
        }
    };

    let mut headers = HeaderMap::new();
    if let Ok(cookie) =
        format!("{CSRF_COOKIE_NAME}={token}; Path=/; SameSite=Lax").parse()
    {
        headers.insert(SET_COOKIE, cookie);
    }

    (StatusCode::OK, headers, Json(CsrfResponse { csrf_token: token })).into_response()
}

fn generate_csrf_token() -> anyhow::Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| anyhow::anyhow!("failed to generate CSRF token: {err}"))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[test]
    fn csrf_token_round_trip() {
        let decoded_len = generate_csrf_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn csrf_tokens_are_unique() {
        let first = generate_csrf_token().expect("generation failed");
        let second = generate_csrf_token().expect("generation failed");
        assert_ne!(first, second);
    }
}
