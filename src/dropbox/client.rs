use super::{FileStore, TokenProvider};
use crate::config::DropboxConfig;
use crate::error::{AuthError, FileStoreError};
use crate::types::{AccessCredential, FileResource, ResourceKind, TokenGrant};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;

/// Dropbox HTTP API client; one instance is shared by every user
#[derive(Clone)]
pub struct DropboxClient {
    client: reqwest::Client,
    api_url: String,
    content_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = ".tag")]
    tag: String,
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    path_lower: Option<String>,
    #[serde(default)]
    rev: Option<String>,
    #[serde(default)]
    content_hash: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    server_modified: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Deleted entries and entries without an id have no resource counterpart
    fn into_resource(self) -> Option<FileResource> {
        let kind = match self.tag.as_str() {
            "file" => ResourceKind::File,
            "folder" => ResourceKind::Folder,
            _ => return None,
        };
        Some(FileResource {
            external_id: self.id?,
            name: self.name,
            kind,
            size: self.size,
            path: self.path_lower,
            rev: self.rev,
            content_hash: self.content_hash,
            modified_at: self.server_modified,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListFolderResult {
    entries: Vec<Metadata>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

impl TokenResponse {
    fn into_grant(self) -> TokenGrant {
        TokenGrant {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
        }
    }
}

impl DropboxClient {
    pub fn new(config: &DropboxConfig) -> Result<Self, FileStoreError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FileStoreError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            content_url: config.content_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    async fn rpc<T: for<'de> Deserialize<'de>>(
        &self,
        access_token: &str,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<T, FileStoreError> {
        let response = self
            .client
            .post(format!("{}/2/{}", self.api_url, endpoint))
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| FileStoreError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            tracing::debug!("Dropbox {} returned {}", endpoint, response.status());
            return Err(FileStoreError::InvalidInput("Resource".to_string()));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FileStoreError::InvalidResponse(e.to_string()))
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        rejected: &str,
    ) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(format!("{}/oauth2/token", self.api_url))
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            tracing::debug!("Dropbox token endpoint returned {}", response.status());
            return Err(AuthError::InvalidCredential(rejected.to_string()));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl FileStore for DropboxClient {
    async fn get_metadata(
        &self,
        access_token: &str,
        locator: &str,
    ) -> Result<FileResource, FileStoreError> {
        let metadata: Metadata = self
            .rpc(access_token, "files/get_metadata", json!({ "path": locator }))
            .await?;
        metadata
            .into_resource()
            .ok_or_else(|| FileStoreError::InvalidInput("Resource".to_string()))
    }

    async fn list_all(
        &self,
        access_token: &str,
        path: &str,
        recursive: bool,
    ) -> Result<Vec<FileResource>, FileStoreError> {
        let mut page: ListFolderResult = self
            .rpc(
                access_token,
                "files/list_folder",
                json!({ "path": path, "recursive": recursive }),
            )
            .await?;

        let mut resources = Vec::new();
        loop {
            resources.extend(page.entries.into_iter().filter_map(Metadata::into_resource));

            let cursor = match page.cursor {
                Some(cursor) if page.has_more => cursor,
                _ => break,
            };
            page = self
                .rpc(
                    access_token,
                    "files/list_folder/continue",
                    json!({ "cursor": cursor }),
                )
                .await?;
        }

        tracing::debug!("Listed {} entries under '{}'", resources.len(), path);
        Ok(resources)
    }

    async fn fetch_bytes(
        &self,
        access_token: &str,
        locator: &str,
    ) -> Result<Vec<u8>, FileStoreError> {
        let response = self
            .client
            .post(format!("{}/2/files/download", self.content_url))
            .bearer_auth(access_token)
            .header("Dropbox-API-Arg", json!({ "path": locator }).to_string())
            .send()
            .await
            .map_err(|e| FileStoreError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FileStoreError::InvalidInput("File".to_string()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FileStoreError::RequestFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TokenProvider for DropboxClient {
    async fn exchange_code(&self, code: &str) -> Result<AccessCredential, AuthError> {
        let grant = self
            .token_request(
                &[
                    ("code", code),
                    ("grant_type", "authorization_code"),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                    ("redirect_uri", self.redirect_uri.as_str()),
                ],
                "Code",
            )
            .await?
            .into_grant();

        let refresh_token = grant.refresh_token.clone().ok_or_else(|| {
            AuthError::InvalidResponse("authorization response has no refresh_token".to_string())
        })?;
        Ok(grant.into_credential(&refresh_token))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        let response = self
            .token_request(
                &[
                    ("refresh_token", refresh_token),
                    ("grant_type", "refresh_token"),
                    ("client_id", self.client_id.as_str()),
                    ("client_secret", self.client_secret.as_str()),
                ],
                "Refresh Token",
            )
            .await?;
        Ok(response.into_grant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Form, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Hits {
        continue_calls: AtomicUsize,
    }

    async fn get_metadata(headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer good") {
            return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
        }
        match body["path"].as_str() {
            Some("id:report") => Json(json!({
                ".tag": "file",
                "id": "id:report",
                "name": "Report.PDF",
                "path_lower": "/docs/report.pdf",
                "rev": "015f",
                "size": 1024,
                "content_hash": "abc",
                "server_modified": "2024-01-02T03:04:05Z"
            }))
            .into_response(),
            _ => (StatusCode::CONFLICT, Json(json!({"error_summary": "path/not_found/"})))
                .into_response(),
        }
    }

    async fn list_folder(Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(body["recursive"], json!(true));
        Json(json!({
            "entries": [
                {".tag": "folder", "id": "id:sub", "name": "sub", "path_lower": "/docs/sub"},
                {".tag": "file", "id": "id:a", "name": "a.pdf", "path_lower": "/docs/a.pdf"},
                {".tag": "deleted", "name": "gone.pdf", "path_lower": "/docs/gone.pdf"}
            ],
            "cursor": "page-2",
            "has_more": true
        }))
    }

    async fn list_folder_continue(
        State(hits): State<Arc<Hits>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        hits.continue_calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(body["cursor"], "page-2");
        Json(json!({
            "entries": [
                {".tag": "file", "id": "id:b", "name": "b.md", "path_lower": "/docs/sub/b.md"}
            ],
            "cursor": "page-3",
            "has_more": false
        }))
    }

    async fn download(headers: HeaderMap) -> impl IntoResponse {
        let arg = headers
            .get("dropbox-api-arg")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let arg: Value = serde_json::from_str(arg).unwrap_or_default();
        if arg["path"] == "id:a" {
            (StatusCode::OK, b"file-bytes".to_vec()).into_response()
        } else {
            StatusCode::CONFLICT.into_response()
        }
    }

    async fn token(Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
        match (form["grant_type"].as_str(), form.get("code"), form.get("refresh_token")) {
            ("authorization_code", Some(code), _) if code == "good-code" => Json(json!({
                "access_token": "access-1",
                "refresh_token": "refresh-1",
                "expires_in": 14400
            }))
            .into_response(),
            ("refresh_token", _, Some(refresh)) if refresh == "refresh-1" => Json(json!({
                "access_token": "access-2",
                "expires_in": 14400
            }))
            .into_response(),
            _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"}))).into_response(),
        }
    }

    async fn spawn_fake_dropbox() -> (DropboxClient, Arc<Hits>) {
        let hits = Arc::new(Hits::default());
        let app = Router::new()
            .route("/2/files/get_metadata", post(get_metadata))
            .route("/2/files/list_folder", post(list_folder))
            .route("/2/files/list_folder/continue", post(list_folder_continue))
            .route("/2/files/download", post(download))
            .route("/oauth2/token", post(token))
            .with_state(hits.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = DropboxConfig {
            client_id: "app-key".to_string(),
            client_secret: "app-secret".to_string(),
            redirect_uri: "http://localhost/callback".to_string(),
            api_url: base.clone(),
            content_url: base,
            ..DropboxConfig::default()
        };
        (DropboxClient::new(&config).unwrap(), hits)
    }

    #[tokio::test]
    async fn test_get_metadata_maps_wire_fields() {
        let (client, _) = spawn_fake_dropbox().await;
        let resource = client.get_metadata("good", "id:report").await.unwrap();

        assert_eq!(resource.external_id, "id:report");
        assert_eq!(resource.kind, ResourceKind::File);
        assert_eq!(resource.path.as_deref(), Some("/docs/report.pdf"));
        assert_eq!(resource.size, Some(1024));
        assert_eq!(resource.extension().as_deref(), Some("pdf"));
        assert!(resource.modified_at.is_some());
    }

    #[tokio::test]
    async fn test_rejected_lookup_is_invalid_input() {
        let (client, _) = spawn_fake_dropbox().await;
        let err = client.get_metadata("good", "id:missing").await.unwrap_err();
        assert!(matches!(err, FileStoreError::InvalidInput(ref what) if what == "Resource"));

        let err = client.get_metadata("bad", "id:report").await.unwrap_err();
        assert!(matches!(err, FileStoreError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_list_all_follows_cursor_and_drops_deleted() {
        let (client, hits) = spawn_fake_dropbox().await;
        let resources = client.list_all("good", "/docs", true).await.unwrap();

        let ids: Vec<_> = resources.iter().map(|r| r.external_id.as_str()).collect();
        assert_eq!(ids, vec!["id:sub", "id:a", "id:b"]);
        assert_eq!(resources[0].kind, ResourceKind::Folder);
        assert_eq!(hits.continue_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_bytes() {
        let (client, _) = spawn_fake_dropbox().await;
        assert_eq!(client.fetch_bytes("good", "id:a").await.unwrap(), b"file-bytes");

        let err = client.fetch_bytes("good", "id:nope").await.unwrap_err();
        assert!(matches!(err, FileStoreError::InvalidInput(ref what) if what == "File"));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let (client, _) = spawn_fake_dropbox().await;
        let credential = client.exchange_code("good-code").await.unwrap();
        assert_eq!(credential.access_token, "access-1");
        assert_eq!(credential.refresh_token, "refresh-1");
        assert!(credential.expires_at > Utc::now() + Duration::hours(3));

        let err = client.exchange_code("stale-code").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential(ref what) if what == "Code"));
    }

    #[tokio::test]
    async fn test_refresh_without_new_refresh_token() {
        let (client, _) = spawn_fake_dropbox().await;
        let grant = client.refresh("refresh-1").await.unwrap();
        assert_eq!(grant.access_token, "access-2");
        assert!(grant.refresh_token.is_none());

        let err = client.refresh("revoked").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredential(ref what) if what == "Refresh Token"));
    }
}
