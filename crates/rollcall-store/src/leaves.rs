//! Leave request records.

use rollcall_core::error::StoreError;
use rusqlite::params;
use serde::Serialize;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::db::{map_store_err, now, Db};

#[derive(Debug, Clone, Serialize)]
pub struct Leave {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub start_date: String,
    pub end_date: String,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewLeave {
    pub user_id: String,
    pub kind: String,
    pub start_date: String,
    pub end_date: String,
    pub reason: Option<String>,
}

#[derive(Clone)]
pub struct LeaveStore {
    conn: Connection,
}

impl LeaveStore {
    pub fn new(db: &Db) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    pub async fn create(&self, new: NewLeave) -> Result<Leave, StoreError> {
        let stamp = now();
        let row = Leave {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            kind: new.kind,
            start_date: new.start_date,
            end_date: new.end_date,
            reason: new.reason,
            status: "pending".to_string(),
            created_at: stamp.clone(),
            updated_at: stamp,
        };
        let stored = row.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO leaves
                        (id, user_id, type, start_date, end_date, reason, status,
                         created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        stored.id,
                        stored.user_id,
                        stored.kind,
                        stored.start_date,
                        stored.end_date,
                        stored.reason,
                        stored.status,
                        stored.created_at,
                        stored.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_store_err)?;
        Ok(row)
    }

    pub async fn list(&self, user_id: Option<String>) -> Result<Vec<Leave>, StoreError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM leaves
                     WHERE (?1 IS NULL OR user_id = ?1)
                     ORDER BY created_at DESC LIMIT 200",
                )?;
                let rows = stmt
                    .query_map([user_id], |row| {
                        Ok(Leave {
                            id: row.get("id")?,
                            user_id: row.get("user_id")?,
                            kind: row.get("type")?,
                            start_date: row.get("start_date")?,
                            end_date: row.get("end_date")?,
                            reason: row.get("reason")?,
                            status: row.get("status")?,
                            created_at: row.get("created_at")?,
                            updated_at: row.get("updated_at")?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_store_err)
    }
}
