//! End-to-end reconciliation tests against an in-process remote.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use notion_sync_core::config::SyncConfig;
use notion_sync_core::error::{SyncError, SyncResult};
use notion_sync_core::item::{SyncAction, SyncItem, SyncStatus};
use notion_sync_core::job::{JobStatus, JobTrigger, OutcomeStatus};
use notion_sync_core::remote::{RemoteClient, RemoteDocument, RemoteMeta};
use notion_sync_core::store::{LocalStore, MemoryStore};
use notion_sync_daemon::reconcile::{CancelFlag, Reconciler};

#[derive(Debug, Clone, Copy)]
enum FailureMode {
    Auth,
    Transient,
}

#[derive(Debug, Clone)]
struct Page {
    doc: RemoteDocument,
    etag: String,
}

/// In-process remote with per-title failure injection and call counters
#[derive(Default)]
struct MockRemote {
    pages: Mutex<HashMap<String, Page>>,
    failures: Mutex<HashMap<String, FailureMode>>,
    next_id: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MockRemote {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn fail_on(&self, title: &str, mode: FailureMode) {
        self.failures.lock().unwrap().insert(title.to_string(), mode);
    }

    fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    fn check_failure(&self, title: &str) -> SyncResult<()> {
        match self.failures.lock().unwrap().get(title) {
            Some(FailureMode::Auth) => Err(SyncError::auth("token revoked")),
            Some(FailureMode::Transient) => Err(SyncError::transient("connection reset")),
            None => Ok(()),
        }
    }

    fn seed_page(&self, id: &str, title: &str, body: &str, etag: &str) {
        self.pages.lock().unwrap().insert(
            id.to_string(),
            Page { doc: RemoteDocument::new(title, body), etag: etag.to_string() },
        );
    }

    fn bump_etag(&self, id: &str, etag: &str) {
        if let Some(page) = self.pages.lock().unwrap().get_mut(id) {
            page.etag = etag.to_string();
        }
    }

    fn remove_page(&self, id: &str) {
        self.pages.lock().unwrap().remove(id);
    }

    fn creates(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    fn updates(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn deletes(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn meta_for(&self, id: &str, etag: &str) -> RemoteMeta {
        RemoteMeta { id: id.to_string(), etag: etag.to_string(), last_edited: Utc::now() }
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn fetch_meta(&self, remote_id: &str) -> SyncResult<Option<RemoteMeta>> {
        let pages = self.pages.lock().unwrap();
        Ok(pages.get(remote_id).map(|p| self.meta_for(remote_id, &p.etag)))
    }

    async fn download(&self, remote_id: &str) -> SyncResult<RemoteDocument> {
        let pages = self.pages.lock().unwrap();
        pages
            .get(remote_id)
            .map(|p| p.doc.clone())
            .ok_or_else(|| SyncError::remote(format!("no such page: {remote_id}")))
    }

    async fn create(&self, doc: &RemoteDocument) -> SyncResult<RemoteMeta> {
        self.check_failure(&doc.title)?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let id = format!("page-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let etag = "etag-1".to_string();
        self.pages
            .lock()
            .unwrap()
            .insert(id.clone(), Page { doc: doc.clone(), etag: etag.clone() });
        Ok(self.meta_for(&id, &etag))
    }

    async fn update(&self, remote_id: &str, doc: &RemoteDocument) -> SyncResult<RemoteMeta> {
        self.check_failure(&doc.title)?;
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut pages = self.pages.lock().unwrap();
        let page = pages
            .get_mut(remote_id)
            .ok_or_else(|| SyncError::remote(format!("no such page: {remote_id}")))?;
        page.doc = doc.clone();
        page.etag = format!("{}+", page.etag);
        Ok(self.meta_for(remote_id, &page.etag))
    }

    async fn delete(&self, remote_id: &str) -> SyncResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.pages.lock().unwrap().remove(remote_id);
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    config: SyncConfig,
    store: Arc<MemoryStore>,
    remote: Arc<MockRemote>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SyncConfig::default();
        config.sync_root = dir.path().to_path_buf();
        // One worker keeps item processing order deterministic.
        config.max_concurrent_uploads = 1;
        Self { _dir: dir, config, store: Arc::new(MemoryStore::new()), remote: MockRemote::new() }
    }

    fn root(&self) -> &Path {
        self.config.sync_root.as_path()
    }

    fn write(&self, name: &str, body: &str) {
        std::fs::write(self.root().join(name), body).unwrap();
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(self.config.clone(), self.store.clone(), self.remote.clone())
    }

    async fn run(&self) -> notion_sync_core::job::JobReport {
        self.reconciler()
            .run_pass(JobTrigger::Manual, &CancelFlag::new())
            .await
            .unwrap()
    }

    async fn items(&self) -> Vec<SyncItem> {
        self.store.load_items().await.unwrap()
    }
}

#[tokio::test]
async fn new_local_files_are_created_remotely() {
    let fx = Fixture::new();
    fx.write("alpha.md", "# Alpha");
    fx.write("beta.md", "# Beta");

    let report = fx.run().await;
    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(report.count(OutcomeStatus::Completed), 2);
    assert_eq!(fx.remote.creates(), 2);

    for item in fx.items().await {
        assert!(item.is_linked());
        assert_eq!(item.status, SyncStatus::Synced);
        assert!(item.local_hash.is_some());
        assert!(item.remote_etag.is_some());
    }
}

#[tokio::test]
async fn second_pass_makes_no_remote_writes() {
    let fx = Fixture::new();
    fx.write("alpha.md", "# Alpha");
    fx.run().await;

    let report = fx.run().await;
    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(fx.remote.creates(), 1);
    assert_eq!(fx.remote.updates(), 0);
    assert_eq!(fx.remote.deletes(), 0);
    assert_eq!(report.outcomes[0].action, SyncAction::Noop);
}

#[tokio::test]
async fn local_edit_updates_the_remote_page() {
    let fx = Fixture::new();
    fx.write("alpha.md", "v1");
    fx.run().await;

    fx.write("alpha.md", "v2");
    let report = fx.run().await;
    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(fx.remote.updates(), 1);
    assert_eq!(report.outcomes[0].action, SyncAction::UpdateRemote);
}

#[tokio::test]
async fn remote_edit_updates_the_local_file() {
    let fx = Fixture::new();
    fx.write("alpha.md", "v1");
    fx.run().await;

    let remote_id = fx.items().await[0].remote_id.clone().unwrap();
    fx.remote.seed_page(&remote_id, "alpha", "remote v2", "etag-9");

    let report = fx.run().await;
    assert_eq!(report.outcomes[0].action, SyncAction::UpdateLocal);
    let body = std::fs::read_to_string(fx.root().join("alpha.md")).unwrap();
    assert_eq!(body, "remote v2");
}

#[tokio::test]
async fn divergent_changes_surface_a_conflict() {
    let fx = Fixture::new();
    fx.write("alpha.md", "v1");
    fx.run().await;

    let remote_id = fx.items().await[0].remote_id.clone().unwrap();
    fx.write("alpha.md", "local v2");
    fx.remote.bump_etag(&remote_id, "etag-remote-2");

    let report = fx.run().await;
    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(report.count(OutcomeStatus::Conflicted), 1);
    // Neither side is touched.
    assert_eq!(fx.remote.updates(), 0);
    let body = std::fs::read_to_string(fx.root().join("alpha.md")).unwrap();
    assert_eq!(body, "local v2");

    let items = fx.items().await;
    assert_eq!(items[0].status, SyncStatus::Conflicted);
    assert!(items[0].last_error.is_some());
}

#[tokio::test]
async fn oversized_file_is_skipped_without_remote_calls() {
    let mut fx = Fixture::new();
    fx.config.max_file_size = 8;
    fx.write("big.md", "this body is longer than eight bytes");

    let report = fx.run().await;
    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(report.count(OutcomeStatus::Skipped), 1);
    assert_eq!(fx.remote.creates(), 0);

    let items = fx.items().await;
    assert_eq!(items[0].status, SyncStatus::Pending);
    assert!(items[0].last_error.as_deref().unwrap().contains("size ceiling"));
}

#[tokio::test]
async fn auth_failure_aborts_the_rest_of_the_pass() {
    let fx = Fixture::new();
    for n in 1..=10 {
        fx.write(&format!("doc{n:02}.md"), "body");
    }
    fx.remote.fail_on("doc05", FailureMode::Auth);

    let report = fx.run().await;
    assert_eq!(report.status, JobStatus::Failed);
    assert_eq!(report.count(OutcomeStatus::Completed), 4);
    assert_eq!(report.count(OutcomeStatus::Failed), 1);
    assert_eq!(report.count(OutcomeStatus::Pending), 5);
    assert_eq!(fx.remote.creates(), 4);

    // Completed items keep their sync point; untouched items are deferred.
    let items = fx.items().await;
    let synced = items.iter().filter(|i| i.status == SyncStatus::Synced).count();
    let pending = items.iter().filter(|i| i.status == SyncStatus::Pending).count();
    let failed = items.iter().filter(|i| i.status == SyncStatus::Failed).count();
    assert_eq!((synced, failed, pending), (4, 1, 5));
}

#[tokio::test]
async fn transient_failure_yields_partial_then_recovers() {
    let fx = Fixture::new();
    fx.write("doc01.md", "a");
    fx.write("doc02.md", "b");
    fx.write("doc03.md", "c");
    fx.remote.fail_on("doc02", FailureMode::Transient);

    let report = fx.run().await;
    assert_eq!(report.status, JobStatus::Partial);
    assert_eq!(report.count(OutcomeStatus::Completed), 2);
    assert_eq!(report.count(OutcomeStatus::Failed), 1);

    fx.remote.clear_failures();
    let report = fx.run().await;
    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(fx.remote.creates(), 3);
}

#[tokio::test]
async fn cancellation_defers_everything() {
    let fx = Fixture::new();
    fx.write("alpha.md", "a");
    fx.write("beta.md", "b");

    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = fx
        .reconciler()
        .run_pass(JobTrigger::Manual, &cancel)
        .await
        .unwrap();

    assert_eq!(report.status, JobStatus::Cancelled);
    assert_eq!(report.count(OutcomeStatus::Pending), 2);
    assert_eq!(fx.remote.creates(), 0);
}

#[tokio::test]
async fn remote_page_downloads_to_a_new_local_file() {
    let fx = Fixture::new();
    fx.remote.seed_page("page-77", "Meeting Notes", "agenda\nitems", "etag-5");
    fx.store
        .upsert_item(&SyncItem::from_remote("page-77"))
        .await
        .unwrap();

    let report = fx.run().await;
    assert_eq!(report.status, JobStatus::Success);
    assert_eq!(report.outcomes[0].action, SyncAction::CreateLocal);

    let path = fx.root().join("Meeting Notes.md");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "agenda\nitems");
    let items = fx.items().await;
    assert_eq!(items[0].local_path.as_deref(), Some(path.as_path()));
    assert_eq!(items[0].status, SyncStatus::Synced);
}

#[tokio::test]
async fn local_deletion_archives_the_remote_page() {
    let fx = Fixture::new();
    fx.write("alpha.md", "body");
    fx.run().await;

    std::fs::remove_file(fx.root().join("alpha.md")).unwrap();
    let report = fx.run().await;
    assert_eq!(report.outcomes[0].action, SyncAction::DeleteRemote);
    assert_eq!(fx.remote.deletes(), 1);
    assert!(fx.items().await.is_empty());
}

#[tokio::test]
async fn remote_deletion_removes_the_local_file() {
    let fx = Fixture::new();
    fx.write("alpha.md", "body");
    fx.run().await;

    let remote_id = fx.items().await[0].remote_id.clone().unwrap();
    fx.remote.remove_page(&remote_id);

    let report = fx.run().await;
    assert_eq!(report.outcomes[0].action, SyncAction::DeleteLocal);
    assert!(!fx.root().join("alpha.md").exists());
    assert!(fx.items().await.is_empty());
}

#[tokio::test]
async fn deletion_with_remote_edit_is_a_conflict() {
    let fx = Fixture::new();
    fx.write("alpha.md", "body");
    fx.run().await;

    let remote_id = fx.items().await[0].remote_id.clone().unwrap();
    std::fs::remove_file(fx.root().join("alpha.md")).unwrap();
    fx.remote.bump_etag(&remote_id, "etag-edited");

    let report = fx.run().await;
    assert_eq!(report.count(OutcomeStatus::Conflicted), 1);
    assert_eq!(fx.remote.deletes(), 0);
}
