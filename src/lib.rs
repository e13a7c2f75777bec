//! # Dropbox RAG - Document Indexing and Semantic Search for a Chat Bot
//!
//! A Rust backend that lets chat-bot users link a Dropbox account, index documents from it
//! into a per-user vector collection, and ask natural-language questions answered from
//! those documents.
//!
//! ## Overview
//!
//! Indexing a file or folder downloads each file, extracts its text, splits it into
//! overlapping token windows and batch-inserts those windows into the user's collection.
//! Every indexed file is recorded in a dedup index so it is never inserted twice. Access
//! tokens are refreshed transparently shortly before they expire.
//!
//! ## Key Features
//!
//! - **Bounded fan-out**: files of a folder are processed concurrently up to a configured limit
//! - **Failure isolation**: one broken file never aborts its siblings; each outcome is reported
//! - **Exactly-once indexing**: dedup markers plus in-process claims on in-flight files
//! - **Token refresh**: one refresh per user at a time, rotated refresh tokens persisted
//! - **Pluggable backends**: SQLite or in-memory stores, Weaviate or in-memory vector store
//!
//! ## Architecture
//!
//! ```text
//!   Chat bot ──HTTP──> server ──> DropboxRagClient
//!                                   │
//!       ┌──────────────┬────────────┼──────────────┬───────────────┐
//!       │              │            │              │               │
//!   UserStore     AccessToken   FileStore    ExtractorRegistry  VectorStore
//!   DedupIndex    Broker        (Dropbox)    + TokenChunker     (Weaviate)
//!   (SQLite)
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the client facade and the indexing pipeline
//! - [`auth`]: access token broker with refresh-before-expiry
//! - [`dropbox`]: Dropbox API client, file store and token provider traits
//! - [`indexer`]: text extraction and token chunking
//! - [`store`]: users, credentials and dedup markers (SQLite and in-memory)
//! - [`vector_db`]: vector store abstraction (Weaviate and in-memory)
//! - [`server`]: axum HTTP routes
//! - [`config`]: configuration with environment variable overrides
//! - [`types`]: domain types and reports
//! - [`error`]: error types and result aliases
//!
//! ## Usage Example
//!
//! ```no_run
//! use dropbox_rag::{Config, DropboxRagClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = DropboxRagClient::from_config(Config::new()?).await?;
//!
//!     let report = client.index_resource("teams-user-1", "id:a4ayc_80_OEAAAAAAAAAXw").await?;
//!     println!("{} indexed, {} failed", report.indexed.len(), report.failed.len());
//!
//!     println!("{}", client.query_text("teams-user-1", "quarterly revenue").await?);
//!     Ok(())
//! }
//! ```

/// Access token broker with refresh-before-expiry
pub mod auth;

/// Client facade and indexing pipeline
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Dropbox API client and the file store / token provider seams
pub mod dropbox;

/// Error types and utilities
pub mod error;

/// Text extraction and token chunking
pub mod indexer;

/// Path utilities
pub mod paths;

/// HTTP routes for the chat bot
pub mod server;

/// Persistence of users, credentials and dedup markers
pub mod store;

/// Domain types shared across modules
pub mod types;

/// Vector database abstraction supporting Weaviate and an in-memory store
pub mod vector_db;

pub use client::{ClientComponents, DropboxRagClient};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use types::{AccessCredential, FileResource, IndexReport, NewUser, QueryResponse, User};
