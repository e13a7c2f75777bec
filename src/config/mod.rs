/// Configuration system for dropbox-rag
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
use crate::error::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Relational database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Dropbox application configuration
    #[serde(default)]
    pub dropbox: DropboxConfig,

    /// Vector database configuration
    #[serde(default)]
    pub vector_db: VectorDbConfig,

    /// Indexing configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Access token configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Relational database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Pool size; each concurrent file task checks out its own connection
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Dropbox application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropboxConfig {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// OAuth redirect URI registered with the Dropbox app
    #[serde(default)]
    pub redirect_uri: String,

    #[serde(default = "default_dropbox_api_url")]
    pub api_url: String,

    #[serde(default = "default_dropbox_content_url")]
    pub content_url: String,

    #[serde(default = "default_dropbox_authorize_url")]
    pub authorize_url: String,

    /// Timeout in seconds for Dropbox requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    /// Weaviate cluster URL
    #[serde(default = "default_vector_db_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: String,

    /// Key forwarded to the text2vec-cohere vectorizer
    #[serde(default)]
    pub cohere_api_key: String,

    /// Maximum vector distance for near-text matches
    #[serde(default = "default_distance")]
    pub distance: f32,

    /// Timeout in seconds for vector database requests
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Tokens per chunk window
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Tokens shared by consecutive windows
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Upper bound on file tasks in flight per index call
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,

    /// Hugging Face tokenizer identifier
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,

    /// Local tokenizer.json, preferred over `tokenizer` when set
    #[serde(default)]
    pub tokenizer_path: Option<String>,
}

/// Access token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Refresh credentials with less than this many seconds of lifetime left
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: i64,
}

// Default value functions
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_database_url() -> String {
    crate::paths::PlatformPaths::default_database_url()
}

fn default_max_connections() -> u32 {
    5
}

fn default_dropbox_api_url() -> String {
    "https://api.dropboxapi.com".to_string()
}

fn default_dropbox_content_url() -> String {
    "https://content.dropboxapi.com".to_string()
}

fn default_dropbox_authorize_url() -> String {
    "https://www.dropbox.com/oauth2/authorize".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_vector_db_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_distance() -> f32 {
    0.5
}

fn default_max_tokens() -> usize {
    256
}

fn default_overlap() -> usize {
    50
}

fn default_max_concurrent_files() -> usize {
    8
}

fn default_tokenizer() -> String {
    "Cohere/Cohere-embed-multilingual-v3.0".to_string()
}

fn default_refresh_margin_secs() -> i64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for DropboxConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            api_url: default_dropbox_api_url(),
            content_url: default_dropbox_content_url(),
            authorize_url: default_dropbox_authorize_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            url: default_vector_db_url(),
            api_key: String::new(),
            cohere_api_key: String::new(),
            distance: default_distance(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap: default_overlap(),
            max_concurrent_files: default_max_concurrent_files(),
            tokenizer: default_tokenizer(),
            tokenizer_path: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_margin_secs: default_refresh_margin_secs(),
        }
    }
}

impl ServerConfig {
    /// Socket address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, Error> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Error> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "must be greater than 0"));
        }

        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections", "must be greater than 0"));
        }

        if self.indexing.max_tokens == 0 {
            return Err(invalid("indexing.max_tokens", "must be greater than 0"));
        }

        if self.indexing.overlap >= self.indexing.max_tokens {
            return Err(invalid(
                "indexing.overlap",
                format!(
                    "must be less than max_tokens ({}), got {}",
                    self.indexing.max_tokens, self.indexing.overlap
                ),
            ));
        }

        if self.indexing.max_concurrent_files == 0 {
            return Err(invalid(
                "indexing.max_concurrent_files",
                "must be greater than 0",
            ));
        }

        if !(0.0..=2.0).contains(&self.vector_db.distance) {
            return Err(invalid(
                "vector_db.distance",
                format!("must be between 0.0 and 2.0, got {}", self.vector_db.distance),
            ));
        }

        if self.auth.refresh_margin_secs < 0 {
            return Err(invalid("auth.refresh_margin_secs", "must not be negative"));
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DROPBOX_RAG_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(port) = std::env::var("DROPBOX_RAG_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
        }

        if let Ok(address) = std::env::var("DROPBOX_RAG_BIND_ADDRESS") {
            self.server.bind_address = address;
        }

        if let Ok(client_id) = std::env::var("DROPBOX_RAG_DROPBOX_CLIENT_ID") {
            self.dropbox.client_id = client_id;
        }

        if let Ok(secret) = std::env::var("DROPBOX_RAG_DROPBOX_CLIENT_SECRET") {
            self.dropbox.client_secret = secret;
        }

        if let Ok(redirect_uri) = std::env::var("DROPBOX_RAG_DROPBOX_REDIRECT_URI") {
            self.dropbox.redirect_uri = redirect_uri;
        }

        if let Ok(url) = std::env::var("DROPBOX_RAG_VECTOR_DB_URL") {
            self.vector_db.url = url;
        }

        if let Ok(key) = std::env::var("DROPBOX_RAG_VECTOR_DB_API_KEY") {
            self.vector_db.api_key = key;
        }

        if let Ok(key) = std::env::var("DROPBOX_RAG_COHERE_API_KEY") {
            self.vector_db.cohere_api_key = key;
        }

        if let Ok(max_tokens) = std::env::var("DROPBOX_RAG_MAX_TOKENS")
            && let Ok(max_tokens) = max_tokens.parse()
        {
            self.indexing.max_tokens = max_tokens;
        }

        if let Ok(overlap) = std::env::var("DROPBOX_RAG_OVERLAP")
            && let Ok(overlap) = overlap.parse()
        {
            self.indexing.overlap = overlap;
        }

        if let Ok(limit) = std::env::var("DROPBOX_RAG_MAX_CONCURRENT_FILES")
            && let Ok(limit) = limit.parse()
        {
            self.indexing.max_concurrent_files = limit;
        }

        if let Ok(path) = std::env::var("DROPBOX_RAG_TOKENIZER_PATH") {
            self.indexing.tokenizer_path = Some(path);
        }
    }

    /// Load from an explicit file, or the default location, then apply env overrides
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load_or_default()?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, Error> {
        Self::load(None)
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> Error {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
    .into()
}
