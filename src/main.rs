use anyhow::Result;
use clap::Parser;
use dropbox_rag::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Dropbox document indexing and semantic search backend
#[derive(Debug, Parser)]
#[command(name = "dropbox-rag", version, about)]
struct Cli {
    /// Path to a TOML config file (defaults to the platform config directory)
    #[arg(short, long, env = "DROPBOX_RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address from the config file
    #[arg(long)]
    bind: Option<String>,

    /// Override the port from the config file
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing, RUST_LOG wins over the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    dropbox_rag::server::serve(config).await?;
    Ok(())
}
