//! HTTP surface for the chat bot
//!
//! Thin axum handlers over [`DropboxRagClient`]. Every error is returned as
//! `{"detail": "<message>"}` with the status its [`ErrorKind`](crate::error::ErrorKind) maps to.

use crate::client::DropboxRagClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{AccessCredential, FileResource, IndexReport, NewUser, User};
use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<DropboxRagClient>,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Wraps a crate error so handlers can use `?`
#[derive(Debug)]
pub struct ApiError(Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        ApiError(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        } else {
            tracing::debug!("Request rejected: {}", self.0);
        }

        let body = Json(ErrorResponse {
            detail: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct TeamsParams {
    teams_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    teams_id: Option<String>,
    #[serde(default)]
    resource_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    teams_id: Option<String>,
    query: Option<String>,
}

/// A query parameter that must be present and non-empty
fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::invalid_input(name))
}

/// POST /user/
async fn create_user(
    State(state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.client.create_user(&new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /dropbox/login/ - redirect to the Dropbox consent page
async fn login(
    State(state): State<AppState>,
    Query(params): Query<TeamsParams>,
) -> ApiResult<Redirect> {
    let teams_id = required(params.teams_id, "teams_id")?;
    let url = state.client.authorization_url(&teams_id)?;
    Ok(Redirect::temporary(&url))
}

/// GET /dropbox/login/callback/
async fn login_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Json<AccessCredential>> {
    let code = required(params.code, "code")?;
    let teams_id = required(params.state, "state")?;
    let credential = state.client.complete_login(&code, &teams_id).await?;
    Ok(Json(credential))
}

/// GET /dropbox/resource/
async fn list_resources(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<FileResource>>> {
    let teams_id = required(params.teams_id, "teams_id")?;
    let path = params.resource_id.unwrap_or_default();
    Ok(Json(state.client.list_resources(&teams_id, &path).await?))
}

/// GET /dropbox/resource/{id}/
async fn resource_metadata(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Query(params): Query<TeamsParams>,
) -> ApiResult<Json<FileResource>> {
    let teams_id = required(params.teams_id, "teams_id")?;
    Ok(Json(
        state
            .client
            .resource_metadata(&teams_id, &resource_id)
            .await?,
    ))
}

/// GET /dropbox/resource/{id}/children/
async fn resource_children(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Query(params): Query<TeamsParams>,
) -> ApiResult<Json<Vec<String>>> {
    let teams_id = required(params.teams_id, "teams_id")?;
    Ok(Json(state.client.children(&teams_id, &resource_id).await?))
}

/// POST /dropbox/index/{id}/
async fn index_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<String>,
    Query(params): Query<TeamsParams>,
) -> ApiResult<(StatusCode, Json<IndexReport>)> {
    let teams_id = required(params.teams_id, "teams_id")?;
    let report = state
        .client
        .index_resource(&teams_id, &resource_id)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// POST /query/
async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<String>> {
    let teams_id = required(params.teams_id, "teams_id")?;
    let text = required(params.query, "query")?;
    Ok(Json(state.client.query_text(&teams_id, &text).await?))
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/user/", post(create_user))
        .route("/dropbox/login/", get(login))
        .route("/dropbox/login/callback/", get(login_callback))
        .route("/dropbox/resource/", get(list_resources))
        .route("/dropbox/resource/:resource_id/", get(resource_metadata))
        .route(
            "/dropbox/resource/:resource_id/children/",
            get(resource_children),
        )
        .route("/dropbox/index/:resource_id/", post(index_resource))
        .route("/query/", post(query))
        .route("/health", get(health))
        .with_state(state)
}

/// Build the production client from `config` and serve until the listener fails
pub async fn serve(config: Config) -> Result<()> {
    let bind_addr = config.server.bind_addr();
    let client = DropboxRagClient::from_config(config).await?;
    let app = create_router(AppState {
        client: Arc::new(client),
    });

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::other(format!("Server error: {}", e)))?;
    Ok(())
}
