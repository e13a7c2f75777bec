use super::{DedupIndex, TokenStore, UserStore};
use crate::error::StoreError;
use crate::types::{AccessCredential, IndexedMarker, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        teams_id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS dropbox_tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
        access_token TEXT NOT NULL,
        refresh_token TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS indexed_resources (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        resource_id TEXT NOT NULL,
        indexed_at TEXT NOT NULL,
        UNIQUE (user_id, resource_id)
    )",
];

/// SQLite-backed store; one pooled connection per concurrent caller
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `url` (e.g. `sqlite:///var/lib/app/app.db?mode=rwc`) and create the schema
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::InitializationFailed(e.to_string()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        if let Some(path) = options.get_filename().parent()
            && !path.as_os_str().is_empty()
        {
            std::fs::create_dir_all(path)
                .map_err(|e| StoreError::InitializationFailed(e.to_string()))?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::InitializationFailed(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::info!("Connected to database at {}", url);
        Ok(store)
    }

    /// Private in-memory database; kept on a single connection that is never recycled
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::InitializationFailed(e.to_string()))?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::InitializationFailed(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::InitializationFailed(e.to_string()))?;
        }
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    Ok(User {
        id: row.try_get("id")?,
        teams_id: row.try_get("teams_id")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, teams_id: &str, name: &str) -> Result<User, StoreError> {
        let created_at = Utc::now();
        let result = sqlx::query("INSERT INTO users (teams_id, name, created_at) VALUES (?, ?, ?)")
            .bind(teams_id)
            .bind(name)
            .bind(created_at)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(User {
                id: done.last_insert_rowid(),
                teams_id: teams_id.to_string(),
                name: name.to_string(),
                created_at,
            }),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict("User".to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_user_by_teams_id(&self, teams_id: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, teams_id, name, created_at FROM users WHERE teams_id = ?")
            .bind(teams_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait]
impl TokenStore for SqliteStore {
    async fn get_credential(&self, user_id: i64) -> Result<Option<AccessCredential>, StoreError> {
        let row = sqlx::query(
            "SELECT access_token, refresh_token, expires_at FROM dropbox_tokens WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(AccessCredential {
            access_token: row.try_get("access_token")?,
            refresh_token: row.try_get("refresh_token")?,
            expires_at: row.try_get::<DateTime<Utc>, _>("expires_at")?,
        }))
    }

    async fn upsert_credential(
        &self,
        user_id: i64,
        credential: &AccessCredential,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO dropbox_tokens (user_id, access_token, refresh_token, expires_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(&credential.access_token)
        .bind(&credential.refresh_token)
        .bind(credential.expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DedupIndex for SqliteStore {
    async fn is_indexed(
        &self,
        user_id: i64,
        resource_external_id: &str,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM indexed_resources WHERE user_id = ? AND resource_id = ?")
            .bind(user_id)
            .bind(resource_external_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn mark_indexed(
        &self,
        user_id: i64,
        resource_external_id: &str,
    ) -> Result<IndexedMarker, StoreError> {
        let indexed_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO indexed_resources (user_id, resource_id, indexed_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(resource_external_id)
        .bind(indexed_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(IndexedMarker {
                user_id,
                resource_external_id: resource_external_id.to_string(),
                indexed_at,
            }),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Conflict(format!(
                "Indexed resource {}",
                resource_external_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn markers(&self, user_id: i64) -> Result<Vec<IndexedMarker>, StoreError> {
        let rows = sqlx::query(
            "SELECT user_id, resource_id, indexed_at FROM indexed_resources
             WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<IndexedMarker, StoreError> {
                Ok(IndexedMarker {
                    user_id: row.try_get("user_id")?,
                    resource_external_id: row.try_get("resource_id")?,
                    indexed_at: row.try_get("indexed_at")?,
                })
            })
            .collect()
    }
}
