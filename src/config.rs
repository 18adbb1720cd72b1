use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

const APP_DIR: &str = "podcast-catalog";
const DB_ENV: &str = "PODCAST_CATALOG_DB";

/// How episode identifiers are derived from feed items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeIdentity {
    /// Hash of feed URL and item title.
    #[default]
    Title,
    /// Hash of feed URL and item GUID, falling back to the title scheme.
    Guid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_minutes: u32,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    #[serde(default = "default_artwork")]
    pub default_artwork: String,

    #[serde(default = "default_unknown_author")]
    pub unknown_author: String,

    #[serde(default)]
    pub episode_identity: EpisodeIdentity,

    #[serde(default)]
    pub seed_feeds: Vec<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("catalog.db").to_string_lossy().to_string()
}

fn default_refresh_interval() -> u32 {
    60
}

fn default_fetch_timeout() -> u64 {
    8
}

fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_artwork() -> String {
    "/static/img/default-artwork.png".to_string()
}

fn default_unknown_author() -> String {
    "Unknown".to_string()
}

fn default_user_agent() -> String {
    format!("{}/{}", APP_DIR, env!("CARGO_PKG_VERSION"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            refresh_interval_minutes: default_refresh_interval(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            default_artwork: default_artwork(),
            unknown_author: default_unknown_author(),
            episode_identity: EpisodeIdentity::default(),
            seed_feeds: Vec::new(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Load from the default location, creating it with defaults when missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            config
        };

        if let Ok(db_path) = std::env::var(DB_ENV) {
            config.db_path = db_path;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if self.refresh_interval_minutes == 0 {
            return Err(AppError::Config(
                "refresh_interval_minutes must be at least 1".into(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(AppError::Config("fetch_timeout_secs must be at least 1".into()));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(AppError::Config(
                "max_concurrent_fetches must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_interval_minutes) * 60)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.refresh_interval_minutes, 60);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(8));
        assert_eq!(config.episode_identity, EpisodeIdentity::Title);
        assert_eq!(config.unknown_author, "Unknown");
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
db_path = "/tmp/catalog.db"
episode_identity = "guid"
seed_feeds = ["https://example.com/show/rss"]
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.episode_identity, EpisodeIdentity::Guid);
        assert_eq!(config.seed_feeds, vec!["https://example.com/show/rss"]);
        assert_eq!(config.refresh_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "db_path = \"x.db\"\nrefresh_interval_minutes = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
