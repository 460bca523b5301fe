use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::item::SyncItem;
use crate::job::JobReport;

/// Core trait for the local persistent store.
///
/// The store owns `SyncItem` records; in-flight jobs reference them and write
/// back status changes through this interface. Store failures are fatal to
/// the current pass; persistent state cannot be trusted without it.
#[async_trait]
pub trait LocalStore: Send + Sync + 'static {
    /// Load every tracked item
    async fn load_items(&self) -> SyncResult<Vec<SyncItem>>;

    /// Look up a single item
    async fn get_item(&self, id: Uuid) -> SyncResult<Option<SyncItem>>;

    /// Insert or replace an item record
    async fn upsert_item(&self, item: &SyncItem) -> SyncResult<()>;

    /// Remove an item record entirely
    async fn remove_item(&self, id: Uuid) -> SyncResult<()>;

    /// Archive a completed pass report into job history
    async fn record_job(&self, report: &JobReport) -> SyncResult<()>;

    /// Most recent pass reports, newest first
    async fn job_history(&self, limit: usize) -> SyncResult<Vec<JobReport>>;
}

/// In-memory store for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<Uuid, SyncItem>>,
    history: RwLock<Vec<JobReport>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn load_items(&self) -> SyncResult<Vec<SyncItem>> {
        let items = self.items.read().await;
        let mut out: Vec<SyncItem> = items.values().cloned().collect();
        out.sort_by_key(|i| i.id);
        Ok(out)
    }

    async fn get_item(&self, id: Uuid) -> SyncResult<Option<SyncItem>> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn upsert_item(&self, item: &SyncItem) -> SyncResult<()> {
        self.items.write().await.insert(item.id, item.clone());
        Ok(())
    }

    async fn remove_item(&self, id: Uuid) -> SyncResult<()> {
        self.items.write().await.remove(&id);
        Ok(())
    }

    async fn record_job(&self, report: &JobReport) -> SyncResult<()> {
        self.history.write().await.push(report.clone());
        Ok(())
    }

    async fn job_history(&self, limit: usize) -> SyncResult<Vec<JobReport>> {
        let history = self.history.read().await;
        Ok(history.iter().rev().take(limit).cloned().collect())
    }
}
