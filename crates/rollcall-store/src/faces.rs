//! Face record store: at most one primary face per user.
//!
//! The invariant is enforced twice: `clear_primary` runs before every
//! primary insert, and the partial unique index rejects the write should a
//! concurrent registration slip between the two steps.

use async_trait::async_trait;
use rollcall_core::error::StoreError;
use rollcall_core::service::FaceRecords;
use rollcall_core::types::{NewUserFace, UserFace};
use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use crate::db::{map_store_err, now, Db};

#[derive(Clone)]
pub struct SqliteFaceStore {
    conn: Connection,
}

impl SqliteFaceStore {
    pub fn new(db: &Db) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// All faces registered for a user, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<UserFace>, StoreError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM user_faces WHERE user_id = ?1 ORDER BY id DESC",
                )?;
                let faces = stmt
                    .query_map([user_id], read_face)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(faces)
            })
            .await
            .map_err(map_store_err)
    }
}

#[async_trait]
impl FaceRecords for SqliteFaceStore {
    async fn find_primary(&self, user_id: i64) -> Result<Option<UserFace>, StoreError> {
        self.conn
            .call(move |conn| {
                let face = conn
                    .query_row(
                        "SELECT * FROM user_faces WHERE user_id = ?1 AND is_primary = 1",
                        [user_id],
                        read_face,
                    )
                    .optional()?;
                Ok(face)
            })
            .await
            .map_err(map_store_err)
    }

    async fn clear_primary(&self, user_id: i64) -> Result<(), StoreError> {
        let stamp = now();
        self.conn
            .call(move |conn| {
                let demoted = conn.execute(
                    "UPDATE user_faces SET is_primary = 0, updated_at = ?2
                     WHERE user_id = ?1 AND is_primary = 1",
                    params![user_id, stamp],
                )?;
                if demoted > 0 {
                    tracing::debug!(user_id, demoted, "previous primary face cleared");
                }
                Ok(())
            })
            .await
            .map_err(map_store_err)
    }

    async fn create(&self, record: NewUserFace) -> Result<UserFace, StoreError> {
        let embedding = serde_json::to_string(&record.embedding)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let stamp = now();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO user_faces
                        (user_id, image_path, image_hash, embedding, embedding_model,
                         embedding_dim, is_primary, metadata, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                    params![
                        record.user_id,
                        record.image_path,
                        record.image_hash,
                        embedding,
                        record.embedding_model,
                        record.embedding_dim,
                        record.is_primary,
                        metadata,
                        stamp,
                    ],
                )?;
                let id = conn.last_insert_rowid();
                let face =
                    conn.query_row("SELECT * FROM user_faces WHERE id = ?1", [id], read_face)?;
                Ok(face)
            })
            .await
            .map_err(map_store_err)
    }
}

fn read_face(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserFace> {
    let embedding: Option<String> = row.get("embedding")?;
    let metadata: Option<String> = row.get("metadata")?;
    Ok(UserFace {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        image_path: row.get("image_path")?,
        image_hash: row.get("image_hash")?,
        embedding: embedding.as_deref().and_then(|s| serde_json::from_str(s).ok()),
        embedding_model: row.get("embedding_model")?,
        embedding_dim: row.get("embedding_dim")?,
        is_primary: row.get("is_primary")?,
        metadata: metadata.as_deref().and_then(|s| serde_json::from_str(s).ok()),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::types::FaceMetadata;

    async fn seed_user(db: &Db, email: &str) -> i64 {
        let email = email.to_string();
        db.connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO users (name, email, password_hash, created_at)
                     VALUES ('Boni', ?1, 'x', '2026-01-01T00:00:00Z')",
                    [email],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
            .unwrap()
    }

    fn new_face(user_id: i64, is_primary: bool) -> NewUserFace {
        NewUserFace {
            user_id,
            image_path: "user-faces/abc.jpg".to_string(),
            image_hash: Some("deadbeef".to_string()),
            embedding: vec![0.1, 0.2, 0.3],
            embedding_model: "ArcFace".to_string(),
            embedding_dim: Some(3),
            is_primary,
            metadata: FaceMetadata {
                disk: "local".to_string(),
                size: 1024,
                mime: "image/jpeg".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_create_and_find_primary() {
        let db = Db::open_in_memory().await.unwrap();
        let store = SqliteFaceStore::new(&db);
        let user = seed_user(&db, "a@example.com").await;

        let created = store.create(new_face(user, true)).await.unwrap();
        assert!(created.is_primary);
        assert_eq!(created.embedding, Some(vec![0.1, 0.2, 0.3]));
        assert_eq!(created.metadata.as_ref().unwrap().mime, "image/jpeg");

        let found = store.find_primary(user).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_second_primary_without_clear_conflicts() {
        let db = Db::open_in_memory().await.unwrap();
        let store = SqliteFaceStore::new(&db);
        let user = seed_user(&db, "b@example.com").await;

        store.create(new_face(user, true)).await.unwrap();
        let err = store.create(new_face(user, true)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn test_clear_then_create_keeps_single_primary() {
        let db = Db::open_in_memory().await.unwrap();
        let store = SqliteFaceStore::new(&db);
        let user = seed_user(&db, "c@example.com").await;

        let first = store.create(new_face(user, true)).await.unwrap();
        store.clear_primary(user).await.unwrap();
        let second = store.create(new_face(user, true)).await.unwrap();

        let primary = store.find_primary(user).await.unwrap().unwrap();
        assert_eq!(primary.id, second.id);

        let all = store.list_for_user(user).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|f| f.is_primary).count(), 1);
        assert!(!all.iter().any(|f| f.id == first.id && f.is_primary));
    }

    #[tokio::test]
    async fn test_clear_primary_is_idempotent() {
        let db = Db::open_in_memory().await.unwrap();
        let store = SqliteFaceStore::new(&db);
        let user = seed_user(&db, "d@example.com").await;

        store.clear_primary(user).await.unwrap();
        store.clear_primary(user).await.unwrap();
        assert!(store.find_primary(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_primary_faces_are_unlimited() {
        let db = Db::open_in_memory().await.unwrap();
        let store = SqliteFaceStore::new(&db);
        let user = seed_user(&db, "e@example.com").await;

        for _ in 0..3 {
            store.create(new_face(user, false)).await.unwrap();
        }
        assert!(store.find_primary(user).await.unwrap().is_none());
        assert_eq!(store.list_for_user(user).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_primaries_are_per_user() {
        let db = Db::open_in_memory().await.unwrap();
        let store = SqliteFaceStore::new(&db);
        let alice = seed_user(&db, "alice@example.com").await;
        let bob = seed_user(&db, "bob@example.com").await;

        store.create(new_face(alice, true)).await.unwrap();
        store.create(new_face(bob, true)).await.unwrap();

        assert!(store.find_primary(alice).await.unwrap().is_some());
        assert!(store.find_primary(bob).await.unwrap().is_some());
    }
}
