use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Default seconds between automatic reconciliation passes
const DEFAULT_SYNC_INTERVAL: u64 = 300;
/// Default per-item size ceiling (50 MiB)
const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
/// Default requests-per-second ceiling for the Notion API
const DEFAULT_RATE_LIMIT: u32 = 3;
/// Default worker bound for concurrent item processing
const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 5;
/// Default total retry attempts for transient failures
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
/// Default base retry delay in seconds
const DEFAULT_RETRY_DELAY: u64 = 1;

/// Configuration for the sync engine and its collaborators.
///
/// Built explicitly and passed to engine construction; there is no ambient
/// global state. `reload()` re-reads the config file and re-applies the
/// environment overlay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// OAuth client id for the Notion integration
    pub client_id: Option<String>,
    /// OAuth client secret for the Notion integration
    pub client_secret: Option<String>,
    /// OAuth callback endpoint
    pub redirect_uri: Option<String>,
    /// Local persistent store location
    pub database_url: PathBuf,
    /// Root directory whose files are synchronized
    pub sync_root: PathBuf,
    /// Seconds between automatic reconciliation passes
    pub sync_interval_secs: u64,
    /// Per-item size ceiling in bytes; oversized items are skipped
    pub max_file_size: u64,
    /// Allow-list of file extensions eligible for sync (lowercase, no dot)
    pub supported_formats: Vec<String>,
    /// Requests-per-second ceiling for the API client
    pub rate_limit: u32,
    /// Worker bound for concurrent item processing
    pub max_concurrent_uploads: usize,
    /// Total attempts for transiently failing remote operations
    pub retry_attempts: u32,
    /// Base delay between retries in seconds (doubled per attempt)
    pub retry_delay_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            database_url: home.join(".notion-sync").join("state.json"),
            sync_root: home.join("NotionSync"),
            sync_interval_secs: DEFAULT_SYNC_INTERVAL,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            supported_formats: ["md", "txt", "html", "json"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rate_limit: DEFAULT_RATE_LIMIT,
            max_concurrent_uploads: DEFAULT_MAX_CONCURRENT_UPLOADS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY,
        }
    }
}

impl SyncConfig {
    /// Build a configuration from defaults overlaid with recognized
    /// environment variables.
    pub fn from_env() -> SyncResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply the environment overlay
    pub fn from_file<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SyncResult<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Copy the config file aside with a timestamp suffix before destructive
    /// changes. Returns the backup path.
    pub fn backup<P: AsRef<Path>>(path: P) -> SyncResult<PathBuf> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SyncError::config(format!(
                "No config file to back up at {}",
                path.display()
            )));
        }
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let backup_path = path.with_extension(format!("toml.{stamp}.bak"));
        std::fs::copy(path, &backup_path)?;
        Ok(backup_path)
    }

    /// Reset the file at `path` to defaults (environment overlay still applies
    /// on the next load)
    pub fn reset<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let config = Self::default();
        config.save(path)?;
        Ok(config)
    }

    /// Re-read the config file and environment, replacing `self`
    pub fn reload<P: AsRef<Path>>(&mut self, path: P) -> SyncResult<()> {
        *self = if path.as_ref().exists() {
            Self::from_file(path)?
        } else {
            Self::from_env()?
        };
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> SyncResult<()> {
        if self.sync_interval_secs == 0 {
            return Err(SyncError::config("sync interval must be non-zero"));
        }
        if self.rate_limit == 0 {
            return Err(SyncError::config("rate limit must be non-zero"));
        }
        if self.max_concurrent_uploads == 0 {
            return Err(SyncError::config("concurrent upload bound must be non-zero"));
        }
        if self.retry_attempts == 0 {
            return Err(SyncError::config("retry attempts must be non-zero"));
        }
        Ok(())
    }

    /// Interval between automatic reconciliation passes
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Base delay between retry attempts
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    /// Whether a file extension (lowercase, without dot) is eligible for sync
    pub fn supports_format(&self, extension: &str) -> bool {
        let ext = extension.to_ascii_lowercase();
        self.supported_formats.iter().any(|f| f == &ext)
    }

    fn apply_env(&mut self) -> SyncResult<()> {
        if let Ok(v) = env::var("NOTION_CLIENT_ID") {
            self.client_id = Some(v);
        }
        if let Ok(v) = env::var("NOTION_CLIENT_SECRET") {
            self.client_secret = Some(v);
        }
        if let Ok(v) = env::var("NOTION_REDIRECT_URI") {
            self.redirect_uri = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database_url = PathBuf::from(v);
        }
        if let Ok(v) = env::var("SYNC_ROOT") {
            self.sync_root = PathBuf::from(v);
        }
        if let Ok(v) = env::var("DEFAULT_SYNC_INTERVAL") {
            self.sync_interval_secs = parse_env("DEFAULT_SYNC_INTERVAL", &v)?;
        }
        if let Ok(v) = env::var("MAX_FILE_SIZE") {
            self.max_file_size = parse_env("MAX_FILE_SIZE", &v)?;
        }
        if let Ok(v) = env::var("SUPPORTED_FORMATS") {
            self.supported_formats = v
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("NOTION_API_RATE_LIMIT") {
            self.rate_limit = parse_env("NOTION_API_RATE_LIMIT", &v)?;
        }
        if let Ok(v) = env::var("MAX_CONCURRENT_UPLOADS") {
            self.max_concurrent_uploads = parse_env("MAX_CONCURRENT_UPLOADS", &v)?;
        }
        if let Ok(v) = env::var("RETRY_ATTEMPTS") {
            self.retry_attempts = parse_env("RETRY_ATTEMPTS", &v)?;
        }
        if let Ok(v) = env::var("RETRY_DELAY") {
            self.retry_delay_secs = parse_env("RETRY_DELAY", &v)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> SyncResult<T> {
    value
        .parse()
        .map_err(|_| SyncError::config(format!("Invalid value for {name}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync_interval(), Duration::from_secs(300));
        assert_eq!(config.rate_limit, 3);
        assert_eq!(config.max_file_size, 50 * 1024 * 1024);
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn format_allow_list() {
        let config = SyncConfig::default();
        assert!(config.supports_format("md"));
        assert!(config.supports_format("MD"));
        assert!(!config.supports_format("exe"));
    }

    #[test]
    fn roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = SyncConfig::default();
        config.sync_interval_secs = 60;
        config.save(&path).unwrap();

        let loaded = SyncConfig::from_file(&path).unwrap();
        assert_eq!(loaded.sync_interval_secs, 60);
    }

    #[test]
    fn backup_copies_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        SyncConfig::default().save(&path).unwrap();

        let backup = SyncConfig::backup(&path).unwrap();
        assert!(backup.exists());
        assert_ne!(backup, path);
    }

    #[test]
    fn reset_restores_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = SyncConfig::default();
        config.rate_limit = 9;
        config.save(&path).unwrap();

        let reset = SyncConfig::reset(&path).unwrap();
        assert_eq!(reset.rate_limit, 3);
    }

    #[test]
    fn zero_interval_rejected() {
        let mut config = SyncConfig::default();
        config.sync_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
