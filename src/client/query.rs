use super::DropboxRagClient;
use crate::error::Result;
use crate::types::QueryResponse;
use crate::vector_db::collection_name;

impl DropboxRagClient {
    /// Nearest-neighbor search over the user's indexed documents, grouped by resource
    pub async fn query(&self, teams_id: &str, text: &str) -> Result<QueryResponse> {
        let user = self.resolve_user(teams_id).await?;
        let response = self
            .vector_store
            .near_text_query(&collection_name(user.id), text)
            .await?;

        tracing::debug!(
            "Query for user {} matched {} resources",
            user.id,
            response.results.len()
        );
        Ok(response)
    }

    /// Same as [`query`](Self::query), rendered as chat text
    pub async fn query_text(&self, teams_id: &str, text: &str) -> Result<String> {
        Ok(self.query(teams_id, text).await?.render())
    }
}
