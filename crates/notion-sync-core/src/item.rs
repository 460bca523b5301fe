use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Sync lifecycle status of a tracked item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Not yet reconciled, or deferred to the next pass
    Pending,
    /// Currently being processed by a pass
    Syncing,
    /// Local and remote agree as of `last_synced`
    Synced,
    /// Both sides changed since the last sync point; needs manual resolution
    Conflicted,
    /// Last attempt surfaced a terminal error
    Failed,
}

/// Action the reconciliation engine decided for an item in the current pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    CreateRemote,
    CreateLocal,
    UpdateRemote,
    UpdateLocal,
    DeleteRemote,
    DeleteLocal,
    Conflict,
    Noop,
}

impl SyncAction {
    /// Whether executing this action issues a remote write call
    pub fn writes_remote(&self) -> bool {
        matches!(
            self,
            SyncAction::CreateRemote | SyncAction::UpdateRemote | SyncAction::DeleteRemote
        )
    }
}

/// A unit of synchronized content: a local file, a remote page, or both.
///
/// An item with both `local_path` and `remote_id` set is "linked"; an item
/// with only one set is "unlinked" and requires a create operation on the
/// other side. Records are owned by the local store and referenced by
/// in-flight jobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncItem {
    /// Stable identifier for the item
    pub id: Uuid,
    /// Absolute path under the sync root, if the item exists locally
    pub local_path: Option<PathBuf>,
    /// Notion page id, if the item exists remotely
    pub remote_id: Option<String>,
    /// Content hash (sha256 hex) recorded at the last sync point
    pub local_hash: Option<String>,
    /// Remote fingerprint (last_edited_time) recorded at the last sync point
    pub remote_etag: Option<String>,
    /// When the item last reached the `Synced` state
    pub last_synced: Option<DateTime<Utc>>,
    /// Current lifecycle status
    pub status: SyncStatus,
    /// Message from the most recent failure, if any
    pub last_error: Option<String>,
}

impl SyncItem {
    /// Create a new item tracking a local file not yet present remotely
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            local_path: Some(path.into()),
            remote_id: None,
            local_hash: None,
            remote_etag: None,
            last_synced: None,
            status: SyncStatus::Pending,
            last_error: None,
        }
    }

    /// Create a new item tracking a remote page not yet present locally
    pub fn from_remote(remote_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            local_path: None,
            remote_id: Some(remote_id.into()),
            local_hash: None,
            remote_etag: None,
            last_synced: None,
            status: SyncStatus::Pending,
            last_error: None,
        }
    }

    /// Whether both sides of the item are established
    pub fn is_linked(&self) -> bool {
        self.local_path.is_some() && self.remote_id.is_some()
    }

    /// Record a successful sync point with the fingerprints that now match
    pub fn mark_synced(&mut self, local_hash: Option<String>, remote_etag: Option<String>) {
        self.local_hash = local_hash;
        self.remote_etag = remote_etag;
        self.last_synced = Some(Utc::now());
        self.status = SyncStatus::Synced;
        self.last_error = None;
    }

    /// Record a terminal failure for this item
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = SyncStatus::Failed;
        self.last_error = Some(error.into());
    }

    /// Defer the item to the next pass without recording a failure
    pub fn mark_pending(&mut self) {
        self.status = SyncStatus::Pending;
    }

    /// Record a detected conflict
    pub fn mark_conflicted(&mut self, detail: impl Into<String>) {
        self.status = SyncStatus::Conflicted;
        self.last_error = Some(detail.into());
    }
}

/// Compute the sha256 hex fingerprint of item content
pub fn content_fingerprint(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Compute the fingerprint of a file on disk
pub fn file_fingerprint(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    Ok(content_fingerprint(&content))
}
