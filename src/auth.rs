//! Access credential brokering
//!
//! [`AccessTokenBroker`] hands out an access token that is good for at least the refresh
//! margin, refreshing and persisting the credential first when it is about to expire.
//! Refreshes for one user are serialized so concurrent callers never spend the same refresh
//! token twice; different users never wait on each other.

use crate::dropbox::TokenProvider;
use crate::error::{Error, Result};
use crate::store::TokenStore;
use crate::types::AccessCredential;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct AccessTokenBroker {
    tokens: Arc<dyn TokenStore>,
    provider: Arc<dyn TokenProvider>,
    refresh_margin: Duration,
    user_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl AccessTokenBroker {
    pub fn new(
        tokens: Arc<dyn TokenStore>,
        provider: Arc<dyn TokenProvider>,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            tokens,
            provider,
            refresh_margin,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    fn user_lock(&self, user_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .user_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(user_id).or_default().clone()
    }

    /// A usable access token for `user_id`
    ///
    /// Fails with `NotFound` when the user never linked an account, and with the provider's
    /// error when a refresh is needed but rejected. Nothing is persisted on failure.
    pub async fn get_valid_access_token(&self, user_id: i64) -> Result<String> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let credential = self
            .tokens
            .get_credential(user_id)
            .await?
            .ok_or_else(|| Error::not_found("Dropbox tokens"))?;

        if !credential.needs_refresh(Utc::now(), self.refresh_margin) {
            return Ok(credential.access_token);
        }

        tracing::info!(
            "Refreshing access token for user {} (expires at {})",
            user_id,
            credential.expires_at
        );
        let grant = self.provider.refresh(&credential.refresh_token).await?;
        let refreshed = grant.into_credential(&credential.refresh_token);
        self.tokens.upsert_credential(user_id, &refreshed).await?;

        Ok(refreshed.access_token)
    }

    /// Replace the user's credential, e.g. after a fresh authorization
    pub async fn store_credential(&self, user_id: i64, credential: &AccessCredential) -> Result<()> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        self.tokens.upsert_credential(user_id, credential).await?;
        Ok(())
    }
}
