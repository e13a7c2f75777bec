use super::{VectorStore, group_by_resource};
use crate::error::VectorDbError;
use crate::types::{Chunk, QueryResponse};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Vector store kept in process memory
///
/// Queries rank chunks by how many query words they contain instead of by embedding
/// distance. Chunks sharing no word with the query are not returned.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Vec<Chunk>>>,
    insert_calls: AtomicUsize,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-empty batch inserts accepted so far
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub async fn has_collection(&self, name: &str) -> bool {
        self.collections.read().await.contains_key(name)
    }

    /// Every chunk stored in a collection, in insertion order
    pub async fn chunks(&self, collection: &str) -> Vec<Chunk> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str) -> Result<(), VectorDbError> {
        self.collections
            .write()
            .await
            .entry(name.to_string())
            .or_default();
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

        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| VectorDbError::CollectionNotFound(collection.to_string()))?;
        let count = chunks.len();
        stored.extend(chunks);
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        Ok(count)
    }

    async fn near_text_query(
        &self,
        collection: &str,
        query: &str,
    ) -> Result<QueryResponse, VectorDbError> {
        let collections = self.collections.read().await;
        let stored = collections
            .get(collection)
            .ok_or_else(|| VectorDbError::CollectionNotFound(collection.to_string()))?;

        let query_words = words(query);
        let mut scored: Vec<(usize, &Chunk)> = stored
            .iter()
            .map(|chunk| {
                let chunk_words = words(&chunk.text);
                let score = query_words
                    .iter()
                    .filter(|w| chunk_words.contains(*w))
                    .count();
                (score, chunk)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(group_by_resource(
            scored.into_iter().map(|(_, chunk)| chunk.clone()),
        ))
    }
}
