//! Token-based auth: login issues a bearer token, logout revokes the
//! owning user's tokens.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Response, ApiError> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(ApiError::Invalid("email and password are required".to_string()));
    }

    let session = state
        .users
        .login(body.email.trim(), &body.password, "mobile")
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    match session {
        Some(session) => Ok(Json(json!({
            "ok": true,
            "user": {
                "id": session.user.id,
                "name": session.user.name,
                "email": session.user.email,
            },
            "token": session.token,
        }))
        .into_response()),
        None => Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
            .into_response()),
    }
}

/// `POST /auth/logout` — revokes every token of the bearer's user.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(&headers) else {
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthenticated" })),
        )
            .into_response());
    };

    let revoked = state
        .users
        .revoke_tokens(token)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !revoked {
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthenticated" })),
        )
            .into_response());
    }

    Ok(Json(json!({ "ok": true })).into_response())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
