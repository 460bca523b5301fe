use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Custom result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Custom error type for sync operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network failure or 429/5xx-equivalent; eligible for retry
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Authentication failure; fatal to the current pass, never retried
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Both sides changed since the last sync point; requires manual resolution
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Oversized or unsupported item; skipped and reported, never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// Local persistent store failure; fatal to the current pass
    #[error("Local store error: {0}")]
    LocalStore(String),

    /// Terminal remote-side failure that is not transient (e.g. 404, 400)
    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),
}

impl SyncError {
    /// Create a new transient network error
    pub fn transient<S: Into<String>>(msg: S) -> Self {
        SyncError::TransientNetwork(msg.into())
    }

    /// Create a new authentication error
    pub fn auth<S: Into<String>>(msg: S) -> Self {
        SyncError::Auth(msg.into())
    }

    /// Create a new conflict error
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        SyncError::Conflict(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        SyncError::Validation(msg.into())
    }

    /// Create a new local store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        SyncError::LocalStore(msg.into())
    }

    /// Create a new terminal remote error
    pub fn remote<S: Into<String>>(msg: S) -> Self {
        SyncError::Remote(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SyncError::Config(msg.into())
    }

    /// Whether the retry policy may re-attempt the failed operation
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::TransientNetwork(_))
    }

    /// Whether the error aborts the remaining work of the current pass.
    ///
    /// Auth failures and local store failures poison the whole pass;
    /// everything else is scoped to a single item.
    pub fn is_pass_fatal(&self) -> bool {
        matches!(self, SyncError::Auth(_) | SyncError::LocalStore(_))
    }
}

impl From<io::Error> for SyncError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
