//! Work assignment records.

use rollcall_core::error::StoreError;
use rusqlite::params;
use serde::Serialize;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::db::{map_store_err, now, Db};

#[derive(Debug, Clone, Serialize)]
pub struct Assignment {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Clone)]
pub struct AssignmentStore {
    conn: Connection,
}

impl AssignmentStore {
    pub fn new(db: &Db) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    pub async fn create(&self, new: NewAssignment) -> Result<Assignment, StoreError> {
        let row = Assignment {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            title: new.title,
            description: new.description,
            image_url: new.image_url,
            created_at: now(),
        };
        let stored = row.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO assignments (id, user_id, title, description, image_url, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        stored.id,
                        stored.user_id,
                        stored.title,
                        stored.description,
                        stored.image_url,
                        stored.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(map_store_err)?;
        Ok(row)
    }

    pub async fn list(&self, user_id: Option<String>) -> Result<Vec<Assignment>, StoreError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM assignments
                     WHERE (?1 IS NULL OR user_id = ?1)
                     ORDER BY created_at DESC LIMIT 200",
                )?;
                let rows = stmt
                    .query_map([user_id], |row| {
                        Ok(Assignment {
                            id: row.get("id")?,
                            user_id: row.get("user_id")?,
                            title: row.get("title")?,
                            description: row.get("description")?,
                            image_url: row.get("image_url")?,
                            created_at: row.get("created_at")?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_store_err)
    }
}
