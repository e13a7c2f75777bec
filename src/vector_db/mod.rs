//! Per-user vector collections
//!
//! Collections hold text chunks tagged with their source resource; the store vectorizes
//! them itself, so callers only ever deal in text.

pub mod memory;
pub mod weaviate;

pub use memory::InMemoryVectorStore;
pub use weaviate::WeaviateStore;

use crate::error::VectorDbError;
use crate::types::{Chunk, QueryResponse, ResourceMatch};
use async_trait::async_trait;

/// Trait for vector database operations
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist yet
    async fn create_collection(&self, name: &str) -> Result<(), VectorDbError>;

    /// Store chunks as one batch; returns how many objects were written
    async fn batch_insert(&self, collection: &str, chunks: Vec<Chunk>)
    -> Result<usize, VectorDbError>;

    /// Nearest-neighbor search by text, grouped by source resource
    async fn near_text_query(
        &self,
        collection: &str,
        query: &str,
    ) -> Result<QueryResponse, VectorDbError>;
}

/// Name of the collection holding a user's chunks
pub fn collection_name(user_id: i64) -> String {
    format!("user_{}", user_id)
}

/// Group ranked hits by resource, in order of each resource's first hit
pub fn group_by_resource(hits: impl IntoIterator<Item = Chunk>) -> QueryResponse {
    let mut results: Vec<ResourceMatch> = Vec::new();
    for hit in hits {
        match results
            .iter_mut()
            .find(|m| m.resource_id == hit.resource_external_id)
        {
            Some(existing) => existing.contents.push(hit.text),
            None => results.push(ResourceMatch {
                resource_id: hit.resource_external_id,
                name: hit.resource_name,
                path: hit.resource_path,
                contents: vec![hit.text],
            }),
        }
    }
    QueryResponse { results }
}
