//! JSON-backed local store.
//!
//! The whole state (item records plus bounded job history) lives in one JSON
//! document, loaded at startup and flushed through a temp-file rename after
//! every mutation. State volumes are small enough that whole-document writes
//! beat the bookkeeping of anything incremental.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use notion_sync_core::error::{SyncError, SyncResult};
use notion_sync_core::item::SyncItem;
use notion_sync_core::job::JobReport;
use notion_sync_core::store::LocalStore;

/// Job reports kept before the oldest are dropped
const MAX_HISTORY: usize = 100;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    items: Vec<SyncItem>,
    history: Vec<JobReport>,
}

#[derive(Debug, Default)]
struct State {
    items: HashMap<Uuid, SyncItem>,
    history: Vec<JobReport>,
}

/// File-backed [`LocalStore`] persisting to a single JSON document
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    state: RwLock<State>,
}

impl JsonStore {
    /// Open the store at `path`, creating an empty one if the file does not
    /// exist yet
    pub fn open(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let path = path.into();
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let doc: StoreDocument = serde_json::from_str(&raw).map_err(|e| {
                SyncError::store(format!("corrupt state file {}: {e}", path.display()))
            })?;
            State {
                items: doc.items.into_iter().map(|i| (i.id, i)).collect(),
                history: doc.history,
            }
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            State::default()
        };
        debug!(path = %path.display(), items = state.items.len(), "opened state store");
        Ok(Self { path, state: RwLock::new(state) })
    }

    /// Flush under an already-held write lock so concurrent mutations
    /// serialize with their own persistence.
    fn flush(&self, state: &State) -> SyncResult<()> {
        let mut items: Vec<SyncItem> = state.items.values().cloned().collect();
        items.sort_by_key(|i| i.id);
        let doc = StoreDocument { items, history: state.history.clone() };

        let body = serde_json::to_string_pretty(&doc)?;
        let tmp = temp_path(&self.path);
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

#[async_trait]
impl LocalStore for JsonStore {
    async fn load_items(&self) -> SyncResult<Vec<SyncItem>> {
        let state = self.state.read().await;
        let mut items: Vec<SyncItem> = state.items.values().cloned().collect();
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    async fn get_item(&self, id: Uuid) -> SyncResult<Option<SyncItem>> {
        Ok(self.state.read().await.items.get(&id).cloned())
    }

    async fn upsert_item(&self, item: &SyncItem) -> SyncResult<()> {
        let mut state = self.state.write().await;
        state.items.insert(item.id, item.clone());
        self.flush(&state)
    }

    async fn remove_item(&self, id: Uuid) -> SyncResult<()> {
        let mut state = self.state.write().await;
        state.items.remove(&id);
        self.flush(&state)
    }

    async fn record_job(&self, report: &JobReport) -> SyncResult<()> {
        let mut state = self.state.write().await;
        state.history.push(report.clone());
        if state.history.len() > MAX_HISTORY {
            let excess = state.history.len() - MAX_HISTORY;
            state.history.drain(..excess);
        }
        self.flush(&state)
    }

    async fn job_history(&self, limit: usize) -> SyncResult<Vec<JobReport>> {
        let state = self.state.read().await;
        Ok(state.history.iter().rev().take(limit).cloned().collect())
    }
}
