//! HTTP handlers and the error-to-status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall_core::error::FaceError;
use rollcall_core::types::RelayedResponse;
use serde_json::json;

pub mod assignments;
pub mod attendance;
pub mod auth;
pub mod faces;
pub mod health;
pub mod leaves;

/// Transport-boundary error. Every internal failure is translated into one
/// of these; raw storage or transport errors never reach the wire.
#[derive(Debug)]
pub enum ApiError {
    /// 422 — missing or malformed request fields.
    Invalid(String),
    /// 400 — the stored reference image could not be fetched.
    BadRequest(String),
    /// 404 — unknown user, missing primary face, missing reference blob.
    NotFound(String),
    /// 409 — lost the primary-face race.
    Conflict(String),
    /// Relay of an upstream refusal: upstream status, `{ok:false, error}` body.
    Upstream(RelayedResponse),
    /// 504 — the face service exceeded its deadline.
    Timeout,
    /// 502 — the face service is unreachable.
    BadGateway(String),
    /// 500 — detail is logged, the body stays generic.
    Internal(String),
}

impl From<FaceError> for ApiError {
    fn from(err: FaceError) -> Self {
        match err {
            FaceError::InvalidInput(msg) => ApiError::Invalid(msg),
            FaceError::UnknownUser(id) => ApiError::NotFound(format!("user {id} not found")),
            FaceError::NoPrimaryFace => {
                ApiError::NotFound("User does not have a primary face registered.".to_string())
            }
            FaceError::EmbeddingFailed(relay) => ApiError::Upstream(relay),
            FaceError::UpstreamTimeout => ApiError::Timeout,
            FaceError::UpstreamUnavailable(detail) => ApiError::BadGateway(detail),
            FaceError::InvalidEmbedding => ApiError::Invalid(
                "Failed to compute embedding for the provided image.".to_string(),
            ),
            FaceError::ReferenceFetchFailed => {
                ApiError::BadRequest("Failed to fetch reference image".to_string())
            }
            FaceError::ReferenceNotFound => {
                ApiError::NotFound("Reference image not found in storage".to_string())
            }
            FaceError::Conflict => {
                ApiError::Conflict("a primary face was registered concurrently".to_string())
            }
            FaceError::Storage(err) => ApiError::Internal(err.to_string()),
            FaceError::Blob(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Invalid(msg) => (StatusCode::UNPROCESSABLE_ENTITY, error_body(&msg)),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, error_body(&msg)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(&msg)),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, error_body(&msg)),
            ApiError::Upstream(relay) => (
                StatusCode::from_u16(relay.status).unwrap_or(StatusCode::BAD_GATEWAY),
                error_body(&relay.detail()),
            ),
            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                error_body("face service call timed out"),
            ),
            ApiError::BadGateway(detail) => (
                StatusCode::BAD_GATEWAY,
                error_body(&format!("face service unreachable: {detail}")),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, error_body("internal error"))
            }
        };
        (status, Json(body)).into_response()
    }
}

fn error_body(message: &str) -> serde_json::Value {
    json!({ "ok": false, "error": message })
}

/// Relay an upstream response verbatim: its status, its body.
pub fn relay_response(relay: RelayedResponse) -> Response {
    let status = StatusCode::from_u16(relay.status).unwrap_or(StatusCode::BAD_GATEWAY);
    (status, Json(relay.body)).into_response()
}
