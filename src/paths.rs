/// Platform-specific default locations for the service's config file and database
///
/// Follows the XDG layout on Linux through the `dirs` crate.
use std::path::PathBuf;

const APP_DIR: &str = "dropbox-rag";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Per-user data directory for this service
    ///
    /// - Linux: $XDG_DATA_HOME/dropbox-rag or ~/.local/share/dropbox-rag
    /// - macOS: ~/Library/Application Support/dropbox-rag
    /// - Windows: %APPDATA%\dropbox-rag
    pub fn project_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Per-user config directory for this service
    pub fn project_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }

    /// Default config file path
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }

    /// Default SQLite database file
    pub fn default_database_path() -> PathBuf {
        Self::project_data_dir().join("dropbox_rag.db")
    }

    /// Default SQLite connection URL (`mode=rwc` creates the file on first use)
    pub fn default_database_url() -> String {
        format!(
            "sqlite://{}?mode=rwc",
            Self::default_database_path().to_string_lossy()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_dirs_end_with_app_name() {
        assert!(PlatformPaths::project_data_dir().ends_with(APP_DIR));
        assert!(PlatformPaths::project_config_dir().ends_with(APP_DIR));
    }

    #[test]
    fn test_default_config_path() {
        let path = PlatformPaths::default_config_path();
        assert!(path.ends_with("dropbox-rag/config.toml"));
    }

    #[test]
    fn test_default_database_url() {
        let url = PlatformPaths::default_database_url();
        assert!(url.starts_with("sqlite://"));
        assert!(url.contains("dropbox_rag.db"));
        assert!(url.ends_with("?mode=rwc"));
    }
}
