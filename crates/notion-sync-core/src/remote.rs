use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;

/// Remote-side fingerprint and identity for a synchronized page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteMeta {
    /// Remote page id
    pub id: String,
    /// Opaque change fingerprint (Notion's last_edited_time rendered verbatim)
    pub etag: String,
    /// When the page was last edited remotely
    pub last_edited: DateTime<Utc>,
}

/// Content of a remote page in transportable form
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteDocument {
    pub title: String,
    pub body: String,
}

impl RemoteDocument {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self { title: title.into(), body: body.into() }
    }
}

/// Core trait for the remote document service.
///
/// Implementations are expected to apply rate limiting and retry internally;
/// the reconciliation engine calls these methods directly.
#[async_trait]
pub trait RemoteClient: Send + Sync + 'static {
    /// Fetch current metadata for a page. `Ok(None)` means the page no longer
    /// exists (deleted or archived remotely).
    async fn fetch_meta(&self, remote_id: &str) -> SyncResult<Option<RemoteMeta>>;

    /// Download page content
    async fn download(&self, remote_id: &str) -> SyncResult<RemoteDocument>;

    /// Create a new page, returning its metadata
    async fn create(&self, doc: &RemoteDocument) -> SyncResult<RemoteMeta>;

    /// Replace the content of an existing page, returning fresh metadata
    async fn update(&self, remote_id: &str, doc: &RemoteDocument) -> SyncResult<RemoteMeta>;

    /// Delete (archive) a page
    async fn delete(&self, remote_id: &str) -> SyncResult<()>;
}
