use notion_sync_core::error::SyncError;

/// Daemon error types
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// File watcher error
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Service lifecycle error
    #[error("Service error: {0}")]
    Service(String),

    /// Error surfaced by the sync core
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonError {
    pub fn watcher(msg: impl Into<String>) -> Self {
        Self::Watcher(msg.into())
    }

    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service(msg.into())
    }
}

impl From<notify::Error> for DaemonError {
    fn from(err: notify::Error) -> Self {
        Self::Watcher(err.to_string())
    }
}

/// Result type for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
