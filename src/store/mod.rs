//! Relational persistence of users, access credentials and dedup markers
//!
//! Backends are shared across concurrent file tasks, so every implementation must be safe
//! to call from many tasks at once: the SQLite backend checks a pooled connection out per
//! call and the in-memory backend serializes through a lock.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::error::StoreError;
use crate::types::{AccessCredential, IndexedMarker, User};
use async_trait::async_trait;

/// Registered users, keyed by their chat-platform identifier
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` if `teams_id` is already registered
    async fn create_user(&self, teams_id: &str, name: &str) -> Result<User, StoreError>;

    async fn find_user_by_teams_id(&self, teams_id: &str) -> Result<Option<User>, StoreError>;
}

/// One access credential per user
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_credential(&self, user_id: i64) -> Result<Option<AccessCredential>, StoreError>;

    /// Insert or replace the user's credential wholesale (last writer wins)
    async fn upsert_credential(
        &self,
        user_id: i64,
        credential: &AccessCredential,
    ) -> Result<(), StoreError>;
}

/// Which external resources have already been indexed for a user
#[async_trait]
pub trait DedupIndex: Send + Sync {
    async fn is_indexed(&self, user_id: i64, resource_external_id: &str)
    -> Result<bool, StoreError>;

    /// Record a marker; fails with `Conflict` if one already exists for the pair
    async fn mark_indexed(
        &self,
        user_id: i64,
        resource_external_id: &str,
    ) -> Result<IndexedMarker, StoreError>;

    /// All markers of a user, oldest first
    async fn markers(&self, user_id: i64) -> Result<Vec<IndexedMarker>, StoreError>;
}
