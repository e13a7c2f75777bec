use super::{DedupIndex, TokenStore, UserStore};
use crate::error::StoreError;
use crate::types::{AccessCredential, IndexedMarker, User};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    next_user_id: i64,
    users: HashMap<String, User>,
    credentials: HashMap<i64, AccessCredential>,
    markers: Vec<IndexedMarker>,
}

/// Process-local store, for tests and single-instance development
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn credential(&self, user_id: i64) -> Option<AccessCredential> {
        self.state.read().await.credentials.get(&user_id).cloned()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, teams_id: &str, name: &str) -> Result<User, StoreError> {
        let mut state = self.state.write().await;
        if state.users.contains_key(teams_id) {
            return Err(StoreError::Conflict("User".to_string()));
        }

        state.next_user_id += 1;
        let user = User {
            id: state.next_user_id,
            teams_id: teams_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        state.users.insert(teams_id.to_string(), user.clone());
        Ok(user)
    }

    async fn find_user_by_teams_id(&self, teams_id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().await.users.get(teams_id).cloned())
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn get_credential(&self, user_id: i64) -> Result<Option<AccessCredential>, StoreError> {
        Ok(self.credential(user_id).await)
    }

    async fn upsert_credential(
        &self,
        user_id: i64,
        credential: &AccessCredential,
    ) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .credentials
            .insert(user_id, credential.clone());
        Ok(())
    }
}

#[async_trait]
impl DedupIndex for InMemoryStore {
    async fn is_indexed(
        &self,
        user_id: i64,
        resource_external_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .markers
            .iter()
            .any(|m| m.user_id == user_id && m.resource_external_id == resource_external_id))
    }

    async fn mark_indexed(
        &self,
        user_id: i64,
        resource_external_id: &str,
    ) -> Result<IndexedMarker, StoreError> {
        let mut state = self.state.write().await;
        if state
            .markers
            .iter()
            .any(|m| m.user_id == user_id && m.resource_external_id == resource_external_id)
        {
            return Err(StoreError::Conflict(format!(
                "Indexed resource {}",
                resource_external_id
            )));
        }

        let marker = IndexedMarker {
            user_id,
            resource_external_id: resource_external_id.to_string(),
            indexed_at: Utc::now(),
        };
        state.markers.push(marker.clone());
        Ok(marker)
    }

    async fn markers(&self, user_id: i64) -> Result<Vec<IndexedMarker>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .markers
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }
}
