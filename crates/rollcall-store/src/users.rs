//! User directory and auth token issuance.
//!
//! Passwords are stored as argon2 hashes; issued tokens are random 32-byte
//! secrets of which only the SHA-256 digest is persisted.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use rand::RngCore;
use rollcall_core::error::StoreError;
use rollcall_core::service::UserDirectory;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio_rusqlite::Connection;

use crate::db::{map_store_err, now, Db};

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: String,
}

/// A successful login: the user plus the plaintext token handed to the
/// caller exactly once.
#[derive(Debug)]
pub struct LoginSession {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Connection,
}

impl SqliteUserStore {
    pub fn new(db: &Db) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    /// Create or update a user keyed by email (seeding is idempotent).
    pub async fn upsert_by_email(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, StoreError> {
        let password_hash = hash_password(password)?;
        let name = name.to_string();
        let email = email.to_string();
        let stamp = now();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO users (name, email, password_hash, created_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(email) DO UPDATE SET
                        name = excluded.name,
                        password_hash = excluded.password_hash",
                    params![name, email, password_hash, stamp],
                )?;
                let user = conn.query_row(
                    "SELECT id, name, email, password_hash, created_at
                     FROM users WHERE email = ?1",
                    [email],
                    read_user,
                )?;
                Ok(user)
            })
            .await
            .map_err(map_store_err)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_string();
        self.conn
            .call(move |conn| {
                let user = conn
                    .query_row(
                        "SELECT id, name, email, password_hash, created_at
                         FROM users WHERE email = ?1",
                        [email],
                        read_user,
                    )
                    .optional()?;
                Ok(user)
            })
            .await
            .map_err(map_store_err)
    }

    /// Verify credentials and issue a token. `None` means bad credentials;
    /// the caller cannot tell an unknown email from a wrong password.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        token_name: &str,
    ) -> Result<Option<LoginSession>, StoreError> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };
        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            return Ok(None);
        }

        let token = generate_token();
        let token_hash = sha256_hex(token.as_bytes());
        let token_name = token_name.to_string();
        let user_id = user.id;
        let stamp = now();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO auth_tokens (user_id, token_hash, name, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![user_id, token_hash, token_name, stamp],
                )?;
                Ok(())
            })
            .await
            .map_err(map_store_err)?;

        tracing::info!(user_id = user.id, "auth token issued");
        Ok(Some(LoginSession { user, token }))
    }

    /// Revoke every token of the user owning `token`. Returns false when
    /// the token is unknown.
    pub async fn revoke_tokens(&self, token: &str) -> Result<bool, StoreError> {
        let token_hash = sha256_hex(token.as_bytes());
        self.conn
            .call(move |conn| {
                let user_id: Option<i64> = conn
                    .query_row(
                        "SELECT user_id FROM auth_tokens WHERE token_hash = ?1",
                        [token_hash],
                        |row| row.get(0),
                    )
                    .optional()?;
                match user_id {
                    Some(user_id) => {
                        conn.execute("DELETE FROM auth_tokens WHERE user_id = ?1", [user_id])?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            })
            .await
            .map_err(map_store_err)
    }
}

#[async_trait]
impl UserDirectory for SqliteUserStore {
    async fn exists(&self, user_id: i64) -> Result<bool, StoreError> {
        self.conn
            .call(move |conn| {
                let found: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                    [user_id],
                    |row| row.get(0),
                )?;
                Ok(found)
            })
            .await
            .map_err(map_store_err)
    }
}

fn read_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        created_at: row.get("created_at")?,
    })
}

fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Unavailable(e.to_string()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteUserStore {
        let db = Db::open_in_memory().await.unwrap();
        SqliteUserStore::new(&db)
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_by_email() {
        let users = store().await;
        let first = users
            .upsert_by_email("Boni", "boni@example.com", "password123")
            .await
            .unwrap();
        let second = users
            .upsert_by_email("Boni Renamed", "boni@example.com", "password123")
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Boni Renamed");
    }

    #[tokio::test]
    async fn test_exists() {
        let users = store().await;
        let user = users
            .upsert_by_email("Farrel", "farrel@example.com", "password123")
            .await
            .unwrap();
        assert!(users.exists(user.id).await.unwrap());
        assert!(!users.exists(user.id + 99).await.unwrap());
    }

    #[tokio::test]
    async fn test_login_issues_token() {
        let users = store().await;
        users
            .upsert_by_email("Juan", "juan@example.com", "password123")
            .await
            .unwrap();

        let session = users
            .login("juan@example.com", "password123", "mobile")
            .await
            .unwrap()
            .expect("valid credentials");
        assert_eq!(session.user.email, "juan@example.com");
        assert_eq!(session.token.len(), 64);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let users = store().await;
        users
            .upsert_by_email("Diqi", "diqi@example.com", "password123")
            .await
            .unwrap();

        assert!(users
            .login("diqi@example.com", "wrong", "mobile")
            .await
            .unwrap()
            .is_none());
        assert!(users
            .login("unknown@example.com", "password123", "mobile")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_revoke_tokens() {
        let users = store().await;
        users
            .upsert_by_email("Wildan", "wildan@example.com", "password123")
            .await
            .unwrap();
        let session = users
            .login("wildan@example.com", "password123", "mobile")
            .await
            .unwrap()
            .unwrap();

        assert!(users.revoke_tokens(&session.token).await.unwrap());
        // Second revoke finds nothing: the token is gone.
        assert!(!users.revoke_tokens(&session.token).await.unwrap());
    }
}
