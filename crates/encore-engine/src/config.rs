use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::recommend::{BlendConfig, SimilarityConfig};
use crate::scoring::ScoreWeights;

/// Configuration for encore.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (ENCORE_* prefix)
/// 3. Config file (~/.config/encore/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the SQLite database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: ENCORE_DATABASE_PATH
    /// - Config: database_path = "/path/to/db"
    /// - Default: ~/.local/share/encore/encore.db
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,

    /// Last.fm API key (similar tracks and enrichment).
    ///
    /// Can be set via:
    /// - ENV: ENCORE_LASTFM_API_KEY
    /// - Config: lastfm_api_key = "..."
    #[serde(default)]
    pub lastfm_api_key: Option<String>,

    /// Composite score weights for snapshot passes.
    #[serde(default)]
    pub scoring: ScoreWeights,

    /// Recommendation blend sizes and request deadline.
    #[serde(default)]
    pub recommend: BlendConfig,

    /// Similar-to-saved bucket settings.
    #[serde(default)]
    pub similarity: SimilarityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            lastfm_api_key: None,
            scoring: ScoreWeights::default(),
            recommend: BlendConfig::default(),
            similarity: SimilarityConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Searches for config file at: ~/.config/encore/config.toml
    /// Reads environment variables with ENCORE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("encore");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;
        config
            .scoring
            .validate()
            .context("Invalid [scoring] weights")?;

        Ok(config)
    }

    /// Load configuration with custom database path.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn load_with_db_path(db_path: PathBuf) -> Result<Self> {
        let mut config = Self::load()?;
        config.database_path = db_path;
        Ok(config)
    }

    /// The Last.fm key, if set to something non-blank.
    pub fn lastfm_key(&self) -> Option<&str> {
        self.lastfm_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Get the default database path.
///
/// Returns: ~/.local/share/encore/encore.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("encore")
        .join("encore.db")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/encore/config.toml
/// - macOS: ~/Library/Application Support/encore/config.toml
/// - Windows: %APPDATA%\encore\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("encore")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Encore Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (ENCORE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Last.fm API key, used for similar-to-saved recommendations and enrichment
#
# Register for a free API key at: https://www.last.fm/api/account/create
#
# Can also be set via:
# - Environment: ENCORE_LASTFM_API_KEY=your-key-here
#lastfm_api_key = "your-lastfm-api-key-here"

# Path to the SQLite database
#
# Can also be set via:
# - CLI: encore --db /custom/path.db snapshot
# - Environment: ENCORE_DATABASE_PATH=/custom/path.db
#
# Default: Platform-specific data directory
#database_path = "/path/to/custom/encore.db"

# Composite popularity score weights. Must be non-negative and sum to 1.0.
[scoring]
counter = 0.3
popularity = 0.2
playcount = 0.1
listeners = 0.1
rating = 0.1
youtube_views = 0.1
youtube_likes = 0.1

# Recommendation blend. Each of the three buckets gets total_limit / 3.
[recommend]
total_limit = 30
candidate_limit = 80
timeout_secs = 60

# Similar-to-saved bucket
[similarity]
favorites_sampled = 5
tracks_per_favorite = 6
request_delay_ms = 250
requests_per_second = 5
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
