use super::{VectorStore, group_by_resource};
use crate::config::VectorDbConfig;
use crate::error::VectorDbError;
use crate::types::{Chunk, QueryResponse};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

const VECTOR_NAME: &str = "content_vector";

/// Weaviate over its REST and GraphQL endpoints, vectorizing with Cohere
pub struct WeaviateStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    cohere_api_key: String,
    distance: f32,
}

#[derive(Debug, Deserialize)]
struct ChunkObject {
    content: String,
    resource_id: String,
    name: String,
    #[serde(default)]
    path: Option<String>,
}

/// Weaviate class names must start with an upper-case letter
fn class_name(collection: &str) -> String {
    let mut chars = collection.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn graphql_errors(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.as_array()?;
    let messages: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("message").and_then(Value::as_str))
        .collect();
    (!errors.is_empty()).then(|| messages.join("; "))
}

fn batch_errors(body: &Value) -> Vec<String> {
    body.as_array()
        .map(|objects| {
            objects
                .iter()
                .filter_map(|o| o.pointer("/result/errors/error")?.as_array())
                .flatten()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl WeaviateStore {
    pub fn new(config: &VectorDbConfig) -> Result<Self, VectorDbError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VectorDbError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            cohere_api_key: config.cohere_api_key.clone(),
            distance: config.distance,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-Cohere-Api-Key", &self.cohere_api_key);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        builder
    }

    async fn collection_exists(&self, class: &str) -> Result<bool, VectorDbError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/v1/schema/{}", class))
            .send()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(VectorDbError::ConnectionFailed(format!(
                "schema lookup for '{}' returned {}",
                class, status
            ))),
        }
    }
}

#[async_trait]
impl VectorStore for WeaviateStore {
    async fn create_collection(&self, name: &str) -> Result<(), VectorDbError> {
        let class = class_name(name);
        if self.collection_exists(&class).await? {
            tracing::debug!("Collection '{}' already exists", class);
            return Ok(());
        }

        let text_property = |name: &str| json!({ "name": name, "dataType": ["text"] });
        let schema = json!({
            "class": class,
            "vectorConfig": {
                VECTOR_NAME: {
                    "vectorizer": {
                        "text2vec-cohere": {
                            "properties": ["content"],
                            "vectorizeClassName": false
                        }
                    },
                    "vectorIndexType": "hnsw"
                }
            },
            "properties": [
                text_property("content"),
                text_property("resource_id"),
                text_property("name"),
                text_property("path"),
            ]
        });

        let response = self
            .request(reqwest::Method::POST, "/v1/schema")
            .json(&schema)
            .send()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VectorDbError::CollectionCreationFailed {
                collection: class,
                reason: format!("{}: {}", status, body),
            });
        }

        tracing::info!("Created collection '{}'", class);
        Ok(())
    }

    async fn batch_insert(
        &self,
        collection: &str,
        chunks: Vec<Chunk>,
    ) -> Result<usize, VectorDbError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let class = class_name(collection);
        let count = chunks.len();
        let objects: Vec<Value> = chunks
            .into_iter()
            .map(|chunk| {
                json!({
                    "class": class,
                    "properties": {
                        "content": chunk.text,
                        "resource_id": chunk.resource_external_id,
                        "name": chunk.resource_name,
                        "path": chunk.resource_path,
                    }
                })
            })
            .collect();

        let response = self
            .request(reqwest::Method::POST, "/v1/batch/objects")
            .json(&json!({ "objects": objects }))
            .send()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| VectorDbError::InsertFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(VectorDbError::InsertFailed(format!("{}: {}", status, body)));
        }

        let errors = batch_errors(&body);
        if let Some(first) = errors.first() {
            return Err(VectorDbError::InsertFailed(format!(
                "{} of {} objects rejected: {}",
                errors.len(),
                count,
                first
            )));
        }

        tracing::debug!("Inserted {} objects into '{}'", count, class);
        Ok(count)
    }

    async fn near_text_query(
        &self,
        collection: &str,
        query: &str,
    ) -> Result<QueryResponse, VectorDbError> {
        let class = class_name(collection);
        let concept =
            serde_json::to_string(query).map_err(|e| VectorDbError::QueryFailed(e.to_string()))?;
        let graphql = format!(
            "{{ Get {{ {class}(nearText: {{concepts: [{concept}], distance: {distance}, targetVectors: [\"{vector}\"]}}) {{ content resource_id name path }} }} }}",
            class = class,
            concept = concept,
            distance = self.distance,
            vector = VECTOR_NAME,
        );

        let response = self
            .request(reqwest::Method::POST, "/v1/graphql")
            .json(&json!({ "query": graphql }))
            .send()
            .await
            .map_err(|e| VectorDbError::ConnectionFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(VectorDbError::QueryFailed(format!(
                "graphql returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| VectorDbError::QueryFailed(e.to_string()))?;
        if let Some(message) = graphql_errors(&body) {
            return Err(VectorDbError::QueryFailed(message));
        }

        let hits = match body.pointer(&format!("/data/Get/{}", class)) {
            Some(Value::Array(hits)) => hits.clone(),
            _ => Vec::new(),
        };
        let chunks = hits
            .into_iter()
            .map(|hit| {
                serde_json::from_value::<ChunkObject>(hit)
                    .map(|object| Chunk {
                        text: object.content,
                        resource_external_id: object.resource_id,
                        resource_name: object.name,
                        resource_path: object.path,
                    })
                    .map_err(|e| VectorDbError::QueryFailed(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(group_by_resource(chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, State};
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        classes: Mutex<Vec<String>>,
        schema_posts: Mutex<usize>,
        batches: Mutex<Vec<Value>>,
        queries: Mutex<Vec<String>>,
        cohere_keys: Mutex<Vec<String>>,
    }

    async fn get_class(
        State(rec): State<Arc<Recorded>>,
        Path(class): Path<String>,
    ) -> impl IntoResponse {
        if rec.classes.lock().unwrap().contains(&class) {
            (StatusCode::OK, Json(json!({ "class": class }))).into_response()
        } else {
            StatusCode::NOT_FOUND.into_response()
        }
    }

    async fn post_schema(State(rec): State<Arc<Recorded>>, Json(body): Json<Value>) -> Json<Value> {
        *rec.schema_posts.lock().unwrap() += 1;
        let class = body["class"].as_str().unwrap().to_string();
        rec.classes.lock().unwrap().push(class);
        Json(body)
    }

    async fn post_batch(
        State(rec): State<Arc<Recorded>>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        if let Some(key) = headers.get("x-cohere-api-key").and_then(|v| v.to_str().ok()) {
            rec.cohere_keys.lock().unwrap().push(key.to_string());
        }
        let objects = body["objects"].as_array().cloned().unwrap_or_default();
        let results: Vec<Value> = objects
            .iter()
            .map(|o| {
                if o["properties"]["content"] == "reject me" {
                    json!({ "result": { "errors": { "error": [{ "message": "bad object" }] } } })
                } else {
                    json!({ "result": {} })
                }
            })
            .collect();
        rec.batches.lock().unwrap().push(body);
        Json(Value::Array(results))
    }

    async fn post_graphql(State(rec): State<Arc<Recorded>>, Json(body): Json<Value>) -> Json<Value> {
        let query = body["query"].as_str().unwrap_or_default().to_string();
        rec.queries.lock().unwrap().push(query.clone());
        if query.contains("Missing") {
            return Json(json!({ "errors": [{ "message": "class Missing not found" }] }));
        }
        Json(json!({
            "data": { "Get": { "User_7": [
                { "content": "first", "resource_id": "id:b", "name": "b.pdf", "path": "/b.pdf" },
                { "content": "second", "resource_id": "id:a", "name": "a.pdf", "path": "/a.pdf" },
                { "content": "third", "resource_id": "id:b", "name": "b.pdf", "path": "/b.pdf" }
            ] } }
        }))
    }

    async fn spawn_fake_weaviate() -> (WeaviateStore, Arc<Recorded>) {
        let rec = Arc::new(Recorded::default());
        let app = Router::new()
            .route("/v1/schema", post(post_schema))
            .route("/v1/schema/:class", get(get_class))
            .route("/v1/batch/objects", post(post_batch))
            .route("/v1/graphql", post(post_graphql))
            .with_state(rec.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = VectorDbConfig {
            url,
            api_key: "wv-key".to_string(),
            cohere_api_key: "co-key".to_string(),
            ..VectorDbConfig::default()
        };
        (WeaviateStore::new(&config).unwrap(), rec)
    }

    fn chunk(text: &str) -> Chunk {
        Chunk {
            text: text.to_string(),
            resource_external_id: "id:a".to_string(),
            resource_name: "a.pdf".to_string(),
            resource_path: Some("/a.pdf".to_string()),
        }
    }

    #[test]
    fn test_class_name_capitalizes() {
        assert_eq!(class_name("user_7"), "User_7");
        assert_eq!(class_name(""), "");
    }

    #[tokio::test]
    async fn test_create_collection_only_once() {
        let (store, rec) = spawn_fake_weaviate().await;
        store.create_collection("user_7").await.unwrap();
        store.create_collection("user_7").await.unwrap();

        assert_eq!(*rec.schema_posts.lock().unwrap(), 1);
        assert_eq!(rec.classes.lock().unwrap().as_slice(), ["User_7".to_string()]);
    }

    #[tokio::test]
    async fn test_batch_insert_sends_one_request() {
        let (store, rec) = spawn_fake_weaviate().await;
        let written = store
            .batch_insert("user_7", vec![chunk("one"), chunk("two")])
            .await
            .unwrap();

        assert_eq!(written, 2);
        let batches = rec.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0]["objects"][0]["class"], "User_7");
        assert_eq!(batches[0]["objects"][1]["properties"]["content"], "two");
        assert_eq!(rec.cohere_keys.lock().unwrap().as_slice(), ["co-key".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let (store, rec) = spawn_fake_weaviate().await;
        assert_eq!(store.batch_insert("user_7", Vec::new()).await.unwrap(), 0);
        assert!(rec.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_object_errors_fail_insert() {
        let (store, _) = spawn_fake_weaviate().await;
        let err = store
            .batch_insert("user_7", vec![chunk("fine"), chunk("reject me")])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorDbError::InsertFailed(ref msg) if msg.contains("bad object")));
    }

    #[tokio::test]
    async fn test_near_text_groups_hits() {
        let (store, rec) = spawn_fake_weaviate().await;
        let response = store
            .near_text_query("user_7", "what does \"b\" say?")
            .await
            .unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].resource_id, "id:b");
        assert_eq!(response.results[0].contents, vec!["first", "third"]);
        assert_eq!(response.results[1].path.as_deref(), Some("/a.pdf"));

        let queries = rec.queries.lock().unwrap();
        assert!(queries[0].contains("User_7(nearText"));
        assert!(queries[0].contains(r#"concepts: ["what does \"b\" say?"]"#));
        assert!(queries[0].contains("distance: 0.5"));
    }

    #[tokio::test]
    async fn test_graphql_errors_surface() {
        let (store, _) = spawn_fake_weaviate().await;
        let err = store.near_text_query("missing", "anything").await.unwrap_err();
        assert!(matches!(err, VectorDbError::QueryFailed(ref msg) if msg.contains("not found")));
    }
}
