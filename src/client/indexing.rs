use super::DropboxRagClient;
use crate::error::{Error, ExtractError, Result, StoreError};
use crate::types::{Chunk, FileFailure, FileOutcome, FileResource, IndexReport, SkipReason};
use crate::vector_db::collection_name;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Instant;

impl DropboxRagClient {
    /// Index a resource for the user identified by `teams_id`
    pub async fn index_resource(&self, teams_id: &str, locator: &str) -> Result<IndexReport> {
        let user = self.resolve_user(teams_id).await?;
        self.index(user.id, locator).await
    }

    /// Index one file, or every file below a folder, into the user's collection
    ///
    /// Fails only if the credential or the locator cannot be resolved, or if the locator
    /// holds no files. Failures of individual files are collected into the report and never
    /// abort their siblings.
    pub async fn index(&self, user_id: i64, locator: &str) -> Result<IndexReport> {
        let start = Instant::now();
        let access_token = self.broker.get_valid_access_token(user_id).await?;

        let root = self.files.get_metadata(&access_token, locator).await?;
        let targets = self.resolve_targets(&access_token, root).await?;
        if targets.is_empty() {
            return Err(Error::not_found("Resources to index"));
        }

        let collection = collection_name(user_id);
        self.vector_store.create_collection(&collection).await?;

        let resources_found = targets.len();
        let limit = self.config.indexing.max_concurrent_files.max(1);
        tracing::info!(
            "Indexing {} files for user {} from '{}' ({} at a time)",
            resources_found,
            user_id,
            locator,
            limit
        );

        let tasks: Vec<_> = targets
            .into_iter()
            .map(|file| self.index_file(user_id, &access_token, &collection, file))
            .collect();
        let outcomes: Vec<FileOutcome> = stream::iter(tasks)
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut report = IndexReport {
            resources_found,
            ..IndexReport::default()
        };
        for outcome in outcomes {
            report.record(outcome);
        }
        report.duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            "Indexed {} files ({} chunks), skipped {}, failed {} for user {} in {}ms",
            report.indexed.len(),
            report.chunks_inserted,
            report.skipped.len(),
            report.failed.len(),
            user_id,
            report.duration_ms
        );
        Ok(report)
    }

    /// Files a resolved locator stands for, each id once, in listing order
    async fn resolve_targets(
        &self,
        access_token: &str,
        root: FileResource,
    ) -> Result<Vec<FileResource>> {
        if root.is_file() {
            return Ok(vec![root]);
        }

        let entries = self
            .files
            .list_all(access_token, &root.external_id, true)
            .await?;
        let mut seen = HashSet::new();
        Ok(entries
            .into_iter()
            .filter(|entry| entry.is_file())
            .filter(|entry| seen.insert(entry.external_id.clone()))
            .collect())
    }

    pub(crate) async fn index_file(
        &self,
        user_id: i64,
        access_token: &str,
        collection: &str,
        file: FileResource,
    ) -> FileOutcome {
        let external_id = file.external_id.clone();
        let Some(_claim) = self.claims.try_claim(user_id, &external_id) else {
            tracing::debug!("{} is already being indexed, skipping", external_id);
            return FileOutcome::Skipped {
                external_id,
                reason: SkipReason::InFlight,
            };
        };

        match self.process_file(user_id, access_token, collection, &file).await {
            Ok(Some(chunks)) => FileOutcome::Indexed {
                external_id,
                chunks,
            },
            Ok(None) => FileOutcome::Skipped {
                external_id,
                reason: SkipReason::AlreadyIndexed,
            },
            Err(e) => {
                tracing::warn!("Failed to index {} ({}): {}", file.name, external_id, e);
                FileOutcome::Failed(FileFailure {
                    external_id,
                    name: file.name,
                    kind: e.kind(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Run one file through fetch, extract, chunk, insert and mark
    ///
    /// Returns `None` when the file was indexed before, otherwise the number of chunks.
    async fn process_file(
        &self,
        user_id: i64,
        access_token: &str,
        collection: &str,
        file: &FileResource,
    ) -> Result<Option<usize>> {
        if self.dedup.is_indexed(user_id, &file.external_id).await? {
            tracing::debug!("{} already indexed, skipping", file.external_id);
            return Ok(None);
        }

        let extension = file
            .extension()
            .ok_or_else(|| ExtractError::UnsupportedFormat(file.name.clone()))?;
        if !self.extractors.supports(&extension) {
            return Err(ExtractError::UnsupportedFormat(extension).into());
        }

        let bytes = self
            .files
            .fetch_bytes(access_token, &file.external_id)
            .await?;
        tracing::debug!("Fetched {} bytes of {}", bytes.len(), file.external_id);

        let extractors = self.extractors.clone();
        let chunker = self.chunker.clone();
        let windows = tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let text = extractors.extract(&extension, &bytes)?;
            Ok(chunker.chunk(&text)?)
        })
        .await
        .map_err(|e| ExtractError::TaskFailed(e.to_string()))??;

        let chunks: Vec<Chunk> = windows
            .into_iter()
            .map(|text| Chunk::for_resource(text, file))
            .collect();
        let count = chunks.len();
        if count > 0 {
            self.vector_store.batch_insert(collection, chunks).await?;
        }

        match self.dedup.mark_indexed(user_id, &file.external_id).await {
            Ok(_) => {}
            Err(StoreError::Conflict(_)) => {
                tracing::warn!(
                    "{} was marked indexed concurrently, keeping existing marker",
                    file.external_id
                );
            }
            Err(e) => return Err(e.into()),
        }

        tracing::debug!("Indexed {} as {} chunks", file.external_id, count);
        Ok(Some(count))
    }
}
