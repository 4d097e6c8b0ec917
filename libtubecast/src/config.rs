//! Configuration management for Tubecast

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::types::{PrivacyStatus, DEFAULT_CATEGORY_ID};

/// Resumable upload chunks must be a multiple of this size
pub const UPLOAD_CHUNK_GRANULARITY: usize = 256 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub youtube: YouTubeConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/tubecast/schedule.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding submitted videos until they are uploaded
    pub upload_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "~/.local/share/tubecast/uploads".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    /// OAuth token written by the installed-app consent flow
    pub token_file: String,
    pub api_base: String,
    pub chunk_size_mb: usize,
    pub default_privacy: PrivacyStatus,
    pub default_category: String,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            token_file: "~/.config/tubecast/youtube_token.json".to_string(),
            api_base: "https://www.googleapis.com".to_string(),
            chunk_size_mb: 8,
            default_privacy: PrivacyStatus::Private,
            default_category: DEFAULT_CATEGORY_ID.to_string(),
        }
    }
}

impl YouTubeConfig {
    /// Chunk size in bytes, rounded down to the protocol granularity
    pub fn chunk_size_bytes(&self) -> usize {
        let bytes = self.chunk_size_mb.max(1) * 1024 * 1024;
        (bytes / UPLOAD_CHUNK_GRANULARITY).max(1) * UPLOAD_CHUNK_GRANULARITY
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Seconds between discovery cycles
    pub poll_interval: u64,
    /// Remove the local file once the platform accepted it
    pub delete_after_upload: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            poll_interval: 60,
            delete_after_upload: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub model: String,
    pub api_base: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// An explicitly named file (`TUBECAST_CONFIG`) must exist. When the
    /// default file is absent the built-in defaults are used.
    pub fn load() -> Result<Self> {
        let explicit = std::env::var("TUBECAST_CONFIG").is_ok();
        let config_path = resolve_config_path()?;

        if !explicit && !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Self::default_config().with_env_overrides();
        }

        Self::load_from_path(&config_path)?.with_env_overrides()
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            youtube: YouTubeConfig::default(),
            scheduling: SchedulingConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(db_path) = std::env::var("TUBECAST_DB_PATH") {
            self.database.path = db_path;
        }
        Ok(self)
    }

    /// Reject values the rest of the system cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()).into());
        }
        if self.storage.upload_dir.trim().is_empty() {
            return Err(ConfigError::MissingField("storage.upload_dir".to_string()).into());
        }
        if self.scheduling.poll_interval == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduling.poll_interval".to_string(),
                message: "must be at least 1 second".to_string(),
            }
            .into());
        }
        if self.youtube.default_category.is_empty()
            || !self.youtube.default_category.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ConfigError::InvalidValue {
                field: "youtube.default_category".to_string(),
                message: format!(
                    "'{}' is not a numeric category id",
                    self.youtube.default_category
                ),
            }
            .into());
        }
        Ok(())
    }

    /// Database path with `~` expanded
    pub fn database_path(&self) -> String {
        expand_path(&self.database.path)
    }

    /// Upload directory with `~` expanded
    pub fn upload_dir(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.storage.upload_dir))
    }

    /// Token file with `~` expanded
    pub fn token_file(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.youtube.token_file))
    }
}

fn expand_path(path: &str) -> String {
    shellexpand::tilde(path).to_string()
}

/// Resolve the configuration file path following XDG Base Directory conventions
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("TUBECAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("tubecast").join("config.toml"))
}
