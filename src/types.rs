use crate::error::ErrorKind;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kind of an entry in the external file store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    File,
    Folder,
}

/// Snapshot of a file or folder as reported by the file store
///
/// Only `external_id` is ever persisted, and only after indexing succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResource {
    /// Opaque identifier, unique within one external account
    pub external_id: String,
    pub name: String,
    pub kind: ResourceKind,
    #[serde(default)]
    pub size: Option<u64>,
    /// Lower-cased display path
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileResource {
    /// Convenience constructor for a file entry
    pub fn file(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(external_id, name, ResourceKind::File)
    }

    /// Convenience constructor for a folder entry
    pub fn folder(external_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(external_id, name, ResourceKind::Folder)
    }

    fn new(external_id: impl Into<String>, name: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            external_id: external_id.into(),
            name: name.into(),
            kind,
            size: None,
            path: None,
            rev: None,
            content_hash: None,
            modified_at: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn is_file(&self) -> bool {
        self.kind == ResourceKind::File
    }

    /// Lower-cased extension of the entry name, if it has one
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Bearer token pair used to call the file store on a user's behalf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessCredential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessCredential {
    /// True when less than `margin` of lifetime remains at `now`
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - now < margin
    }
}

/// Token response from a refresh grant; the provider may omit the refresh token
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl TokenGrant {
    /// Build the replacement credential, keeping `previous_refresh` unless the grant carries a new one
    pub fn into_credential(self, previous_refresh: &str) -> AccessCredential {
        AccessCredential {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .unwrap_or_else(|| previous_refresh.to_string()),
            expires_at: self.expires_at,
        }
    }
}

/// Persisted record that a resource has been indexed for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedMarker {
    pub user_id: i64,
    pub resource_external_id: String,
    pub indexed_at: DateTime<Utc>,
}

/// A token window of extracted text, tagged with its source resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub resource_external_id: String,
    pub resource_name: String,
    pub resource_path: Option<String>,
}

impl Chunk {
    pub fn for_resource(text: String, resource: &FileResource) -> Self {
        Self {
            text,
            resource_external_id: resource.external_id.clone(),
            resource_name: resource.name.clone(),
            resource_path: resource.path.clone(),
        }
    }
}

/// A registered chat-bot user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Identifier of the user in the chat platform
    pub teams_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Request body to register a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub teams_id: String,
    pub name: String,
}

/// Why a file task did no work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A dedup marker already exists
    AlreadyIndexed,
    /// Another task is indexing the same resource right now
    InFlight,
}

/// A file task that failed, kept so callers can see what was not indexed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFailure {
    pub external_id: String,
    pub name: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Terminal state of one file task
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Indexed { external_id: String, chunks: usize },
    Skipped { external_id: String, reason: SkipReason },
    Failed(FileFailure),
}

/// Aggregate result of one `index` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexReport {
    /// Number of file resources the locator resolved to
    pub resources_found: usize,
    /// External ids indexed by this call
    pub indexed: Vec<String>,
    /// External ids skipped because they were indexed before or in flight
    pub skipped: Vec<String>,
    /// Files whose task failed
    pub failed: Vec<FileFailure>,
    /// Total chunks inserted into the vector store
    pub chunks_inserted: usize,
    pub duration_ms: u64,
}

impl IndexReport {
    pub fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Indexed {
                external_id,
                chunks,
            } => {
                self.chunks_inserted += chunks;
                self.indexed.push(external_id);
            }
            FileOutcome::Skipped { external_id, .. } => self.skipped.push(external_id),
            FileOutcome::Failed(failure) => self.failed.push(failure),
        }
    }

    /// Number of file tasks that reached a terminal state
    pub fn processed(&self) -> usize {
        self.indexed.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Chunks of one resource that matched a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMatch {
    pub resource_id: String,
    pub name: String,
    pub path: Option<String>,
    pub contents: Vec<String>,
}

/// Query results grouped by originating resource, in first-hit order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub results: Vec<ResourceMatch>,
}

impl QueryResponse {
    /// Render the results as chat text
    pub fn render(&self) -> String {
        if self.results.is_empty() {
            return "No results found.".to_string();
        }

        let mut text = String::from("Here are the results of your query:\n");
        for result in &self.results {
            let source = result.path.as_deref().unwrap_or(&result.name);
            text.push_str(&format!("FROM: {}\n", source));
            for content in &result.contents {
                text.push_str(content);
                text.push('\n');
            }
        }
        text
    }
}

#[cfg(test)]
mod tests;
