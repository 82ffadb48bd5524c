use std::sync::Arc;

use rollcall_core::client::FaceApiClient;
use rollcall_core::service::{BlobStore, FaceRecords, FaceService, UserDirectory};
use rollcall_store::assignments::AssignmentStore;
use rollcall_store::attendance::AttendanceStore;
use rollcall_store::db::DbError;
use rollcall_store::leaves::LeaveStore;
use rollcall_store::{Db, FsBlobStore, SqliteFaceStore, SqliteUserStore};

use crate::config::Config;

/// Shared handler state: one database, one blob root, one face service.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub users: Arc<SqliteUserStore>,
    pub faces: Arc<SqliteFaceStore>,
    pub attendance: AttendanceStore,
    pub assignments: AssignmentStore,
    pub leaves: LeaveStore,
    pub face_service: Arc<FaceService>,
}

/// Open the database and wire every store and the face service together.
pub async fn init(config: &Config) -> Result<AppState, DbError> {
    let db = Db::open(&config.db_path).await?;
    let users = Arc::new(SqliteUserStore::new(&db));
    let faces = Arc::new(SqliteFaceStore::new(&db));
    let blobs = Arc::new(FsBlobStore::new(&config.blob_root));
    let gateway = Arc::new(FaceApiClient::with_timeouts(
        config.face_api_url.clone(),
        config.call_timeout(),
        config.fetch_timeout(),
    ));

    let face_service = Arc::new(FaceService::new(
        users.clone() as Arc<dyn UserDirectory>,
        faces.clone() as Arc<dyn FaceRecords>,
        blobs as Arc<dyn BlobStore>,
        gateway,
    ));

    Ok(AppState {
        attendance: AttendanceStore::new(&db),
        assignments: AssignmentStore::new(&db),
        leaves: LeaveStore::new(&db),
        users,
        faces,
        face_service,
        db,
    })
}
