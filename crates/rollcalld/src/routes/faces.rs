//! Face registration and verification endpoints (multipart).

use std::collections::HashMap;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall_core::service::{RegisterRequest, VerifyRequest};
use rollcall_core::types::ImageUpload;
use serde_json::json;

use super::{relay_response, ApiError};
use crate::state::AppState;

/// `POST /user-faces` — register a face, optionally as the user's primary.
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;
    let user_id = require_user_id(&form)?;
    let image = require_image(&form)?;
    let is_primary = match form.fields.get("is_primary") {
        Some(raw) => parse_bool(raw)
            .ok_or_else(|| ApiError::Invalid("is_primary must be a boolean".to_string()))?,
        None => false,
    };

    let face = state
        .face_service
        .register(RegisterRequest {
            user_id,
            image,
            is_primary,
            model_name: form.fields.get("model_name").cloned(),
            detector_backend: form.fields.get("detector_backend").cloned(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "face": face }))).into_response())
}

/// `POST /face/verify` — verify an uploaded image against the user's
/// primary face; the upstream answer is relayed with its own status.
pub async fn verify(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;
    let user_id = require_user_id(&form)?;
    let image = require_image(&form)?;
    let threshold = match form.fields.get("threshold") {
        Some(raw) => Some(
            raw.trim()
                .parse::<f64>()
                .map_err(|_| ApiError::Invalid("threshold must be numeric".to_string()))?,
        ),
        None => None,
    };

    let relay = state
        .face_service
        .verify(VerifyRequest {
            user_id,
            image,
            model_name: form.fields.get("model_name").cloned(),
            detector_backend: form.fields.get("detector_backend").cloned(),
            distance_metric: form.fields.get("distance_metric").cloned(),
            threshold,
        })
        .await?;

    Ok(relay_response(relay))
}

struct UploadForm {
    fields: HashMap<String, String>,
    image: Option<ImageUpload>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut fields = HashMap::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Invalid(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Invalid(format!("failed to read image upload: {e}")))?;
            image = Some(ImageUpload {
                bytes: bytes.to_vec(),
                filename,
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::Invalid(format!("failed to read field {name}: {e}")))?;
            fields.insert(name, value);
        }
    }

    Ok(UploadForm { fields, image })
}

fn require_user_id(form: &UploadForm) -> Result<i64, ApiError> {
    let raw = form
        .fields
        .get("user_id")
        .ok_or_else(|| ApiError::Invalid("user_id is required".to_string()))?;
    raw.trim()
        .parse()
        .map_err(|_| ApiError::Invalid("user_id must be an integer".to_string()))
}

fn require_image(form: &UploadForm) -> Result<ImageUpload, ApiError> {
    form.image
        .clone()
        .ok_or_else(|| ApiError::Invalid("image file is required".to_string()))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}
