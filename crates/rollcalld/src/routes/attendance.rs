//! Attendance check-in/check-out endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, NaiveTime};
use rollcall_store::attendance::CheckIn;
use serde::Deserialize;
use serde_json::json;

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub user_id: Option<i64>,
}

/// `GET /attendances`
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let rows = state
        .attendance
        .list(params.user_id)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(rows).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CheckInBody {
    pub user_id: i64,
    pub date: String,
    pub time: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub distance_m: Option<f64>,
}

/// `POST /attendances/check-in`
pub async fn check_in(
    State(state): State<AppState>,
    Json(body): Json<CheckInBody>,
) -> Result<Response, ApiError> {
    validate_date(&body.date)?;
    validate_time(&body.time)?;

    let row = state
        .attendance
        .check_in(CheckIn {
            user_id: body.user_id,
            date: body.date,
            time: body.time,
            latitude: body.latitude,
            longitude: body.longitude,
            distance_m: body.distance_m,
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(row).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CheckOutBody {
    pub user_id: i64,
    pub date: String,
    pub time: String,
    pub activity: Option<String>,
}

/// `POST /attendances/check-out`
pub async fn check_out(
    State(state): State<AppState>,
    Json(body): Json<CheckOutBody>,
) -> Result<Response, ApiError> {
    validate_date(&body.date)?;
    validate_time(&body.time)?;

    let row = state
        .attendance
        .check_out(body.user_id, &body.date, &body.time, body.activity)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    match row {
        Some(row) => Ok(Json(row).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Attendance not found" })),
        )
            .into_response()),
    }
}

fn validate_date(raw: &str) -> Result<(), ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| ApiError::Invalid("date must be YYYY-MM-DD".to_string()))
}

fn validate_time(raw: &str) -> Result<(), ApiError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .map(|_| ())
        .map_err(|_| ApiError::Invalid("time must be HH:MM:SS".to_string()))
}
