/// Centralized error types for dropbox-rag using thiserror
///
/// Every error classifies into an [`ErrorKind`], which the HTTP layer maps to a status code.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the indexing service
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("File store error: {0}")]
    FileStore(#[from] FileStoreError),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    #[error("Vector database error: {0}")]
    VectorDb(#[from] VectorDbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used for status mapping and per-file reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    UnsupportedFormat,
    Conflict,
    InvalidConfiguration,
    Upstream,
    Internal,
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors raised while turning raw bytes into text
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to parse document: {0}")]
    ParseFailed(String),

    #[error("Extraction task failed: {0}")]
    TaskFailed(String),
}

/// Errors related to token chunking
#[derive(Error, Debug)]
pub enum ChunkingError {
    #[error("Invalid chunker configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to load tokenizer: {0}")]
    TokenizerLoad(String),

    #[error("Tokenization failed: {0}")]
    Tokenize(String),
}

/// Errors from relational persistence (users, credentials, dedup markers)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Failed to initialize database: {0}")]
    InitializationFailed(String),
}

/// Errors from the external file store
#[derive(Error, Debug)]
pub enum FileStoreError {
    #[error("Invalid {0}")]
    InvalidInput(String),

    #[error("Request to file store failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected response from file store: {0}")]
    InvalidResponse(String),
}

/// Errors from the OAuth token provider
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid {0}")]
    InvalidCredential(String),

    #[error("Token request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected token response: {0}")]
    InvalidResponse(String),
}

/// Errors related to vector database operations
#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Failed to connect to vector database: {0}")]
    ConnectionFailed(String),

    #[error("Failed to create collection '{collection}': {reason}")]
    CollectionCreationFailed { collection: String, reason: String },

    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("Failed to insert objects: {0}")]
    InsertFailed(String),

    #[error("Failed to query collection: {0}")]
    QueryFailed(String),
}

/// Result alias used across the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(format!("{:#}", err))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err.into())
    }
}

impl Error {
    /// Create a new error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Create an invalid-input error naming the rejected value
    pub fn invalid_input(what: impl Into<String>) -> Self {
        Error::InvalidInput(what.into())
    }

    /// Create a not-found error for the named item
    pub fn not_found(item: impl Into<String>) -> Self {
        Error::NotFound(item.into())
    }

    /// Classify this error into the service taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) | Error::VectorDb(VectorDbError::CollectionNotFound(_)) => {
                ErrorKind::NotFound
            }
            Error::Config(_) | Error::Chunking(ChunkingError::InvalidConfiguration(_)) => {
                ErrorKind::InvalidConfiguration
            }
            Error::Extract(ExtractError::UnsupportedFormat(_)) => ErrorKind::UnsupportedFormat,
            Error::Store(StoreError::Conflict(_)) => ErrorKind::Conflict,
            Error::InvalidInput(_)
            | Error::FileStore(FileStoreError::InvalidInput(_))
            | Error::Auth(AuthError::InvalidCredential(_)) => ErrorKind::InvalidInput,
            Error::FileStore(_) | Error::Auth(_) | Error::VectorDb(_) => ErrorKind::Upstream,
            Error::Extract(_)
            | Error::Chunking(_)
            | Error::Store(_)
            | Error::Io(_)
            | Error::Other(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status code for this error at the service boundary
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Check if this is a caller error rather than a system failure
    pub fn is_user_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound
                | ErrorKind::InvalidInput
                | ErrorKind::UnsupportedFormat
                | ErrorKind::Conflict
        )
    }
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::InvalidInput => 422,
            ErrorKind::UnsupportedFormat => 415,
            ErrorKind::Conflict => 409,
            ErrorKind::Upstream => 502,
            ErrorKind::InvalidConfiguration | ErrorKind::Internal => 500,
        }
    }
}
