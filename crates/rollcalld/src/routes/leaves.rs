//! Leave request endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use rollcall_store::leaves::NewLeave;
use serde::Deserialize;

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub user_id: Option<String>,
}

/// `GET /leaves`
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let rows = state
        .leaves
        .list(params.user_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(rows).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub start_date: String,
    pub end_date: String,
    pub reason: Option<String>,
}

/// `POST /leaves`
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateBody>,
) -> Result<Response, ApiError> {
    if body.user_id.trim().is_empty() || body.kind.trim().is_empty() {
        return Err(ApiError::Invalid("user_id and type are required".to_string()));
    }
    for date in [&body.start_date, &body.end_date] {
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(ApiError::Invalid("dates must be YYYY-MM-DD".to_string()));
        }
    }

    let row = state
        .leaves
        .create(NewLeave {
            user_id: body.user_id,
            kind: body.kind,
            start_date: body.start_date,
            end_date: body.end_date,
            reason: body.reason,
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(row)).into_response())
}
