//! rollcalld — HTTP daemon for the Rollcall attendance backend.
//!
//! Routes multipart face registration/verification into `rollcall-core` and
//! the plain HR record endpoints into `rollcall-store`.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

pub mod config;
pub mod routes;
pub mod state;

pub use config::Config;
pub use state::AppState;

/// Uploaded face images are small; 10 MiB leaves generous headroom.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/health/db", get(routes::health::health_db))
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/logout", post(routes::auth::logout))
        .route(
            "/assignments",
            get(routes::assignments::list).post(routes::assignments::create),
        )
        .route("/attendances", get(routes::attendance::list))
        .route("/attendances/check-in", post(routes::attendance::check_in))
        .route("/attendances/check-out", post(routes::attendance::check_out))
        .route(
            "/leaves",
            get(routes::leaves::list).post(routes::leaves::create),
        )
        .route("/user-faces", post(routes::faces::register))
        .route("/face/verify", post(routes::faces::verify))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
