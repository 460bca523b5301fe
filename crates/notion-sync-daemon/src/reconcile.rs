//! Reconciliation engine.
//!
//! One pass compares every eligible [`SyncItem`] against the current local
//! fingerprint and remote etag, decides an action, and executes it through
//! the remote client and local store. Items are processed concurrently up to
//! the configured worker bound; the shared rate limiter inside the remote
//! client is the single point of contention.
//!
//! Failure of one item never blocks or rolls back its siblings. Auth and
//! local-store failures are pass-fatal: completed outcomes stand, remaining
//! items are deferred as pending. Conflicts are detected, never resolved.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use notion_sync_core::config::SyncConfig;
use notion_sync_core::error::{SyncError, SyncResult};
use notion_sync_core::item::{content_fingerprint, SyncAction, SyncItem, SyncStatus};
use notion_sync_core::job::{ItemOutcome, JobReport, JobStatus, JobTrigger, SyncEvent};
use notion_sync_core::remote::{RemoteClient, RemoteDocument, RemoteMeta};
use notion_sync_core::store::LocalStore;

use crate::watcher::scan_eligible;

/// Cooperative cancellation for an in-flight pass.
///
/// Checked between items, never mid-item, so cancellation always leaves
/// per-item state consistent.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Decide the action for one item given its recorded sync point, the current
/// local content hash, and the current remote metadata.
pub fn plan_action(
    item: &SyncItem,
    local_hash: Option<&str>,
    remote: Option<&RemoteMeta>,
) -> SyncAction {
    match (item.local_path.is_some(), item.remote_id.is_some()) {
        (true, false) => {
            if local_hash.is_some() {
                SyncAction::CreateRemote
            } else {
                SyncAction::Noop
            }
        }
        (false, true) => {
            if remote.is_some() {
                SyncAction::CreateLocal
            } else {
                SyncAction::Noop
            }
        }
        (false, false) => SyncAction::Noop,
        (true, true) => {
            let remote_etag = remote.map(|m| m.etag.as_str());
            let local_changed = local_hash != item.local_hash.as_deref();
            let remote_changed = remote_etag != item.remote_etag.as_deref();
            match (local_hash, remote_etag) {
                (Some(_), Some(_)) => match (local_changed, remote_changed) {
                    (true, true) => SyncAction::Conflict,
                    (true, false) => SyncAction::UpdateRemote,
                    (false, true) => SyncAction::UpdateLocal,
                    (false, false) => SyncAction::Noop,
                },
                // Local file gone: safe to delete remotely only if the
                // remote side has not moved since the last sync point.
                (None, Some(_)) => {
                    if remote_changed {
                        SyncAction::Conflict
                    } else {
                        SyncAction::DeleteRemote
                    }
                }
                // Remote page gone: mirror of the above.
                (Some(_), None) => {
                    if local_changed {
                        SyncAction::Conflict
                    } else {
                        SyncAction::DeleteLocal
                    }
                }
                (None, None) => SyncAction::Noop,
            }
        }
    }
}

const CONFLICT_DETAIL: &str = "local and remote both changed since last sync point";

type ItemError = (SyncAction, SyncError);

/// Executes reconciliation passes against a store and a remote client
#[derive(Clone)]
pub struct Reconciler {
    config: SyncConfig,
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteClient>,
    events: broadcast::Sender<SyncEvent>,
}

impl Reconciler {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteClient>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self { config, store, remote, events }
    }

    /// Subscribe to progress events for running passes
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<SyncEvent> {
        self.events.clone()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one reconciliation pass. Store failures while loading state are
    /// pass-fatal and surface as an error; everything else is captured in
    /// the report.
    pub async fn run_pass(
        &self,
        trigger: JobTrigger,
        cancel: &CancelFlag,
    ) -> SyncResult<JobReport> {
        self.discover_local_items().await?;

        let mut items = self.store.load_items().await?;
        items.sort_by(|a, b| a.local_path.cmp(&b.local_path).then(a.id.cmp(&b.id)));

        let mut report = JobReport::begin(trigger);
        let job_id = report.id;
        let _ = self.events.send(SyncEvent::JobStarted {
            job_id,
            trigger,
            total_items: items.len(),
        });

        let fatal = AtomicBool::new(false);
        let outcomes: Vec<ItemOutcome> = stream::iter(items.into_iter().map(|item| {
            let fatal = &fatal;
            async move {
                if cancel.is_cancelled() || fatal.load(Ordering::SeqCst) {
                    let outcome = ItemOutcome::pending(item.id);
                    self.defer(item).await;
                    return outcome;
                }
                let (outcome, item_fatal) = self.process_item(item).await;
                if item_fatal {
                    fatal.store(true, Ordering::SeqCst);
                }
                let _ = self
                    .events
                    .send(SyncEvent::ItemFinished { job_id, outcome: outcome.clone() });
                outcome
            }
        }))
        .buffered(self.config.max_concurrent_uploads.max(1))
        .collect()
        .await;

        for outcome in outcomes {
            report.record(outcome);
        }

        let imposed = if cancel.is_cancelled() {
            Some(JobStatus::Cancelled)
        } else if fatal.load(Ordering::SeqCst) {
            Some(JobStatus::Failed)
        } else {
            None
        };
        report.finish(imposed);

        self.store.record_job(&report).await?;
        let _ = self.events.send(SyncEvent::JobFinished { report: report.clone() });
        info!(
            job = %report.id,
            status = ?report.status,
            items = report.outcomes.len(),
            "reconciliation pass finished"
        );
        Ok(report)
    }

    /// Track eligible local files that have no item record yet
    async fn discover_local_items(&self) -> SyncResult<()> {
        let known: HashSet<PathBuf> = self
            .store
            .load_items()
            .await?
            .into_iter()
            .filter_map(|item| item.local_path)
            .collect();

        for path in scan_eligible(&self.config) {
            if !known.contains(&path) {
                debug!(path = %path.display(), "tracking new local file");
                self.store.upsert_item(&SyncItem::from_local(path)).await?;
            }
        }
        Ok(())
    }

    /// Process one item end to end. Returns the outcome and whether the
    /// failure (if any) is fatal to the rest of the pass.
    async fn process_item(&self, mut item: SyncItem) -> (ItemOutcome, bool) {
        let id = item.id;
        item.status = SyncStatus::Syncing;

        // Validation gate: oversized or unsupported items never reach the
        // remote client.
        if let Some(path) = item.local_path.clone() {
            if path.exists() {
                if let Err(reason) = self.validate_file(&path) {
                    warn!(item = %id, %reason, "item skipped by validation");
                    item.mark_pending();
                    item.last_error = Some(reason.clone());
                    let fatal = self.persist(&item).await;
                    return (ItemOutcome::skipped(id, reason), fatal);
                }
            }
        }

        match self.reconcile_item(&mut item).await {
            Ok((action, outcome)) => {
                let fatal = match action {
                    SyncAction::DeleteRemote | SyncAction::DeleteLocal => {
                        self.remove(&item).await
                    }
                    _ => self.persist(&item).await,
                };
                (outcome, fatal)
            }
            Err((action, err)) => {
                let pass_fatal = err.is_pass_fatal();
                if pass_fatal {
                    warn!(item = %id, error = %err, "pass-fatal error, aborting remaining items");
                }
                item.mark_failed(err.to_string());
                let persist_fatal = self.persist(&item).await;
                (
                    ItemOutcome::failed(id, action, err.to_string()),
                    pass_fatal || persist_fatal,
                )
            }
        }
    }

    async fn reconcile_item(
        &self,
        item: &mut SyncItem,
    ) -> Result<(SyncAction, ItemOutcome), ItemError> {
        let id = item.id;

        let local_content = match &item.local_path {
            Some(path) if path.exists() => Some(
                tokio::fs::read(path)
                    .await
                    .map_err(|e| (SyncAction::Noop, SyncError::from(e)))?,
            ),
            _ => None,
        };
        let local_hash = local_content.as_deref().map(content_fingerprint);

        let remote_meta = match &item.remote_id {
            Some(remote_id) => self
                .remote
                .fetch_meta(remote_id)
                .await
                .map_err(|e| (SyncAction::Noop, e))?,
            None => None,
        };

        let action = plan_action(item, local_hash.as_deref(), remote_meta.as_ref());
        debug!(item = %id, ?action, "planned action");

        match action {
            SyncAction::Noop => Ok((action, ItemOutcome::completed(id, SyncAction::Noop))),

            SyncAction::Conflict => {
                item.mark_conflicted(CONFLICT_DETAIL);
                Ok((action, ItemOutcome::conflicted(id, CONFLICT_DETAIL)))
            }

            SyncAction::CreateRemote => {
                let path = require_path(item, action)?;
                let doc = document_for(&path, local_content.unwrap_or_default());
                let meta = self.remote.create(&doc).await.map_err(|e| (action, e))?;
                item.remote_id = Some(meta.id.clone());
                item.mark_synced(local_hash, Some(meta.etag));
                Ok((action, ItemOutcome::completed(id, action)))
            }

            SyncAction::UpdateRemote => {
                let path = require_path(item, action)?;
                let remote_id = require_remote_id(item, action)?;
                let doc = document_for(&path, local_content.unwrap_or_default());
                let meta = self
                    .remote
                    .update(&remote_id, &doc)
                    .await
                    .map_err(|e| (action, e))?;
                item.mark_synced(local_hash, Some(meta.etag));
                Ok((action, ItemOutcome::completed(id, action)))
            }

            SyncAction::CreateLocal => {
                let remote_id = require_remote_id(item, action)?;
                let doc = self
                    .remote
                    .download(&remote_id)
                    .await
                    .map_err(|e| (action, e))?;
                let path = self.fresh_local_path(&doc.title);
                self.write_local(&path, &doc.body).await.map_err(|e| (action, e))?;
                let hash = content_fingerprint(doc.body.as_bytes());
                item.local_path = Some(path);
                item.mark_synced(Some(hash), remote_meta.map(|m| m.etag));
                Ok((action, ItemOutcome::completed(id, action)))
            }

            SyncAction::UpdateLocal => {
                let remote_id = require_remote_id(item, action)?;
                let path = require_path(item, action)?;
                let doc = self
                    .remote
                    .download(&remote_id)
                    .await
                    .map_err(|e| (action, e))?;
                self.write_local(&path, &doc.body).await.map_err(|e| (action, e))?;
                let hash = content_fingerprint(doc.body.as_bytes());
                item.mark_synced(Some(hash), remote_meta.map(|m| m.etag));
                Ok((action, ItemOutcome::completed(id, action)))
            }

            SyncAction::DeleteRemote => {
                let remote_id = require_remote_id(item, action)?;
                self.remote.delete(&remote_id).await.map_err(|e| (action, e))?;
                Ok((action, ItemOutcome::completed(id, action)))
            }

            SyncAction::DeleteLocal => {
                let path = require_path(item, action)?;
                if path.exists() {
                    tokio::fs::remove_file(&path)
                        .await
                        .map_err(|e| (action, SyncError::from(e)))?;
                }
                Ok((action, ItemOutcome::completed(id, action)))
            }
        }
    }

    fn validate_file(&self, path: &Path) -> Result<(), String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !self.config.supports_format(ext) {
            return Err(format!("unsupported format: {}", path.display()));
        }
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > self.config.max_file_size => Err(format!(
                "file exceeds size ceiling ({} > {} bytes)",
                meta.len(),
                self.config.max_file_size
            )),
            Ok(_) => Ok(()),
            Err(err) => Err(format!("cannot stat {}: {err}", path.display())),
        }
    }

    /// Pick a path under the sync root for newly downloaded remote content
    fn fresh_local_path(&self, title: &str) -> PathBuf {
        let safe: String = title
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '-' } else { c })
            .collect();
        let base = if safe.trim().is_empty() { "Untitled".to_string() } else { safe };
        let candidate = self.config.sync_root.join(format!("{base}.md"));
        if !candidate.exists() {
            return candidate;
        }
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        self.config.sync_root.join(format!("{base}-{}.md", &suffix[..8]))
    }

    async fn write_local(&self, path: &Path, body: &str) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, body).await?;
        Ok(())
    }

    /// Persist item state; a store failure here poisons the pass
    async fn persist(&self, item: &SyncItem) -> bool {
        if let Err(err) = self.store.upsert_item(item).await {
            warn!(item = %item.id, error = %err, "failed to persist item state");
            true
        } else {
            false
        }
    }

    /// Drop the record of a fully deleted item
    async fn remove(&self, item: &SyncItem) -> bool {
        if let Err(err) = self.store.remove_item(item.id).await {
            warn!(item = %item.id, error = %err, "failed to remove item record");
            true
        } else {
            false
        }
    }

    /// Defer an item to the next pass without touching either side
    async fn defer(&self, mut item: SyncItem) {
        item.mark_pending();
        if let Err(err) = self.store.upsert_item(&item).await {
            warn!(item = %item.id, error = %err, "failed to defer item");
        }
    }
}

fn document_for(path: &Path, content: Vec<u8>) -> RemoteDocument {
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string());
    RemoteDocument { title, body: String::from_utf8_lossy(&content).into_owned() }
}

fn require_path(item: &SyncItem, action: SyncAction) -> Result<PathBuf, ItemError> {
    item.local_path
        .clone()
        .ok_or_else(|| (action, SyncError::store("item has no local path")))
}

fn require_remote_id(item: &SyncItem, action: SyncAction) -> Result<String, ItemError> {
    item.remote_id
        .clone()
        .ok_or_else(|| (action, SyncError::store("item has no remote id")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    /// Remote that answers every call without side effects
    #[derive(Debug, Default)]
    pub struct NullRemote;

    #[async_trait]
    impl RemoteClient for NullRemote {
        async fn fetch_meta(&self, _remote_id: &str) -> SyncResult<Option<RemoteMeta>> {
            Ok(None)
        }

        async fn download(&self, remote_id: &str) -> SyncResult<RemoteDocument> {
            Err(SyncError::remote(format!("no such page: {remote_id}")))
        }

        async fn create(&self, doc: &RemoteDocument) -> SyncResult<RemoteMeta> {
            Ok(RemoteMeta {
                id: format!("page-{}", doc.title),
                etag: "etag-0".into(),
                last_edited: Utc::now(),
            })
        }

        async fn update(&self, remote_id: &str, _doc: &RemoteDocument) -> SyncResult<RemoteMeta> {
            Ok(RemoteMeta {
                id: remote_id.to_string(),
                etag: "etag-1".into(),
                last_edited: Utc::now(),
            })
        }

        async fn delete(&self, _remote_id: &str) -> SyncResult<()> {
            Ok(())
        }
    }
}
