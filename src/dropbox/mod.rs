//! External file store and OAuth token provider
//!
//! Both are traits so the indexing pipeline and the token broker can be driven by fakes in
//! tests; [`DropboxClient`] implements both against the Dropbox HTTP API.

mod client;

pub use client::DropboxClient;

use crate::config::DropboxConfig;
use crate::error::{AuthError, ConfigError, FileStoreError};
use crate::types::{AccessCredential, FileResource, TokenGrant};
use async_trait::async_trait;
use reqwest::Url;

/// Read access to a user's files
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Metadata of one file or folder, addressed by id or path
    async fn get_metadata(
        &self,
        access_token: &str,
        locator: &str,
    ) -> Result<FileResource, FileStoreError>;

    /// Every entry under `path` (`""` is the root), following pagination to the end
    async fn list_all(
        &self,
        access_token: &str,
        path: &str,
        recursive: bool,
    ) -> Result<Vec<FileResource>, FileStoreError>;

    async fn fetch_bytes(&self, access_token: &str, locator: &str)
    -> Result<Vec<u8>, FileStoreError>;
}

/// OAuth2 code exchange and refresh
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Exchange a one-time authorization code for an offline credential
    async fn exchange_code(&self, code: &str) -> Result<AccessCredential, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError>;
}

/// Authorization URL the user visits to grant offline access; `state` comes back on the callback
pub fn authorization_url(config: &DropboxConfig, state: &str) -> Result<String, ConfigError> {
    let url = Url::parse_with_params(
        &config.authorize_url,
        &[
            ("response_type", "code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("state", state),
            ("token_access_type", "offline"),
        ],
    )
    .map_err(|e| ConfigError::InvalidValue {
        key: "dropbox.authorize_url".to_string(),
        reason: e.to_string(),
    })?;
    Ok(url.into())
}
