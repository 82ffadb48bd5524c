//! Assignment record endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rollcall_store::assignments::NewAssignment;
use serde::Deserialize;

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub user_id: Option<String>,
}

/// `GET /assignments`
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let rows = state
        .assignments
        .list(params.user_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(rows).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// `POST /assignments`
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateBody>,
) -> Result<Response, ApiError> {
    if body.user_id.trim().is_empty() || body.title.trim().is_empty() {
        return Err(ApiError::Invalid("user_id and title are required".to_string()));
    }

    let row = state
        .assignments
        .create(NewAssignment {
            user_id: body.user_id,
            title: body.title,
            description: body.description,
            image_url: body.image_url,
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(row)).into_response())
}
