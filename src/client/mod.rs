//! Core library client for dropbox-rag
//!
//! [`DropboxRagClient`] wires the stores, the Dropbox API, the vector store and the indexing
//! pipeline together. The HTTP server is a thin layer over it, and it can be embedded
//! directly as a library.

mod index_lock;
mod indexing;
mod query;

use crate::auth::AccessTokenBroker;
use crate::config::Config;
use crate::dropbox::{self, DropboxClient, FileStore, TokenProvider};
use crate::error::{Error, Result};
use crate::indexer::{ExtractorRegistry, HfTokenizer, TokenChunker, Tokenize};
use crate::store::{DedupIndex, SqliteStore, TokenStore, UserStore};
use crate::types::{AccessCredential, FileResource, NewUser, User};
use crate::vector_db::{VectorStore, WeaviateStore, collection_name};
use index_lock::ResourceClaims;
use std::path::PathBuf;
use std::sync::Arc;

/// Pluggable backends of a [`DropboxRagClient`]
pub struct ClientComponents {
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub dedup: Arc<dyn DedupIndex>,
    pub files: Arc<dyn FileStore>,
    pub provider: Arc<dyn TokenProvider>,
    pub vector_store: Arc<dyn VectorStore>,
    pub extractors: ExtractorRegistry,
    pub tokenizer: Arc<dyn Tokenize>,
}

/// Main client for linking accounts, indexing resources and querying them
///
/// # Example
///
/// ```no_run
/// use dropbox_rag::{Config, DropboxRagClient};
///
/// #[tokio::main]
/// async fn main() -> dropbox_rag::Result<()> {
///     let client = DropboxRagClient::from_config(Config::load_or_default()?).await?;
///     let report = client.index_resource("teams-user-1", "id:a4ayc_80_OEAAAAAAAAAXw").await?;
///     println!("Indexed {} files", report.indexed.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct DropboxRagClient {
    pub(crate) users: Arc<dyn UserStore>,
    pub(crate) dedup: Arc<dyn DedupIndex>,
    pub(crate) files: Arc<dyn FileStore>,
    pub(crate) provider: Arc<dyn TokenProvider>,
    pub(crate) vector_store: Arc<dyn VectorStore>,
    pub(crate) broker: Arc<AccessTokenBroker>,
    pub(crate) extractors: Arc<ExtractorRegistry>,
    pub(crate) chunker: Arc<TokenChunker>,
    pub(crate) config: Arc<Config>,
    // Resources some task of this process is indexing right now
    pub(crate) claims: ResourceClaims,
}

impl DropboxRagClient {
    /// Build a client from explicit backends
    ///
    /// Fails with `InvalidConfiguration` if the chunk window settings are invalid.
    pub fn with_components(config: Config, components: ClientComponents) -> Result<Self> {
        let chunker = TokenChunker::new(
            components.tokenizer,
            config.indexing.max_tokens,
            config.indexing.overlap,
        )?;
        let broker = AccessTokenBroker::new(
            components.tokens,
            components.provider.clone(),
            chrono::Duration::seconds(config.auth.refresh_margin_secs),
        );

        Ok(Self {
            users: components.users,
            dedup: components.dedup,
            files: components.files,
            provider: components.provider,
            vector_store: components.vector_store,
            broker: Arc::new(broker),
            extractors: Arc::new(components.extractors),
            chunker: Arc::new(chunker),
            config: Arc::new(config),
            claims: ResourceClaims::default(),
        })
    }

    /// Build the production client: SQLite, the Dropbox API and Weaviate
    pub async fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(
            SqliteStore::connect(&config.database.url, config.database.max_connections).await?,
        );
        let dropbox = Arc::new(DropboxClient::new(&config.dropbox)?);
        let vector_store = Arc::new(WeaviateStore::new(&config.vector_db)?);
        let tokenizer = load_tokenizer(&config).await?;

        tracing::info!(
            "Client ready (vector store at {}, {} concurrent files)",
            config.vector_db.url,
            config.indexing.max_concurrent_files
        );

        Self::with_components(
            config,
            ClientComponents {
                users: store.clone(),
                tokens: store.clone(),
                dedup: store,
                files: dropbox.clone(),
                provider: dropbox,
                vector_store,
                extractors: ExtractorRegistry::with_defaults(),
                tokenizer,
            },
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register a user and make sure their vector collection exists
    pub async fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let user = self
            .users
            .create_user(&new_user.teams_id, &new_user.name)
            .await?;
        self.vector_store
            .create_collection(&collection_name(user.id))
            .await?;

        tracing::info!("Registered user {} ({})", user.id, user.teams_id);
        Ok(user)
    }

    /// Resolve a chat-platform identifier to the registered user
    pub async fn resolve_user(&self, teams_id: &str) -> Result<User> {
        self.users
            .find_user_by_teams_id(teams_id)
            .await?
            .ok_or_else(|| Error::not_found("User"))
    }

    /// URL where the user grants offline access; the callback carries `teams_id` back as state
    pub fn authorization_url(&self, teams_id: &str) -> Result<String> {
        Ok(dropbox::authorization_url(&self.config.dropbox, teams_id)?)
    }

    /// Finish account linking: exchange `code` and store the credential for the user in `state`
    pub async fn complete_login(&self, code: &str, state: &str) -> Result<AccessCredential> {
        if code.is_empty() {
            return Err(Error::invalid_input("Code"));
        }
        if state.is_empty() {
            return Err(Error::invalid_input("State"));
        }

        let credential = self.provider.exchange_code(code).await?;
        let user = self.resolve_user(state).await?;
        self.broker.store_credential(user.id, &credential).await?;

        tracing::info!("Linked Dropbox account for user {}", user.id);
        Ok(credential)
    }

    /// Entries directly under `path` (`""` for the root)
    pub async fn list_resources(&self, teams_id: &str, path: &str) -> Result<Vec<FileResource>> {
        let access_token = self.access_token_for(teams_id).await?;
        Ok(self.files.list_all(&access_token, path, false).await?)
    }

    /// Ids of the entries directly under a folder
    pub async fn children(&self, teams_id: &str, resource_id: &str) -> Result<Vec<String>> {
        let access_token = self.access_token_for(teams_id).await?;
        let entries = self.files.list_all(&access_token, resource_id, false).await?;
        Ok(entries.into_iter().map(|r| r.external_id).collect())
    }

    pub async fn resource_metadata(&self, teams_id: &str, resource_id: &str) -> Result<FileResource> {
        let access_token = self.access_token_for(teams_id).await?;
        Ok(self.files.get_metadata(&access_token, resource_id).await?)
    }

    async fn access_token_for(&self, teams_id: &str) -> Result<String> {
        let user = self.resolve_user(teams_id).await?;
        self.broker.get_valid_access_token(user.id).await
    }
}

async fn load_tokenizer(config: &Config) -> Result<Arc<dyn Tokenize>> {
    let path = config.indexing.tokenizer_path.clone().map(PathBuf::from);
    let identifier = config.indexing.tokenizer.clone();

    // Hub downloads block, keep them off the runtime threads
    let tokenizer = tokio::task::spawn_blocking(move || match path {
        Some(path) => HfTokenizer::from_file(&path),
        None => HfTokenizer::from_pretrained(&identifier),
    })
    .await
    .map_err(|e| Error::other(format!("Tokenizer loading task failed: {}", e)))??;

    Ok(Arc::new(tokenizer))
}
