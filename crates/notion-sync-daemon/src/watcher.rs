//! Filesystem watcher feeding the change intake.
//!
//! Raw `notify` events are filtered for eligibility, coalesced by the
//! [`ChangeIntake`], and surface as a pass trigger once a non-empty batch is
//! ready.

use std::path::{Path, PathBuf};

use notify::event::{Event, EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use notion_sync_core::config::SyncConfig;
use notion_sync_core::job::JobTrigger;

use crate::error::DaemonResult;
use crate::intake::{ChangeEvent, ChangeIntake, ChangeKind, DEFAULT_DEBOUNCE_WINDOW};

/// Directories never watched or scanned
const IGNORED_DIRS: &[&str] = &[".git", ".svn", "node_modules", "__pycache__", ".vscode"];

/// Whether a path is eligible for synchronization under this configuration
pub fn is_eligible(config: &SyncConfig, path: &Path) -> bool {
    let file_name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    // Hidden files and editor temp files
    if file_name.starts_with('.') || file_name.starts_with('~') || file_name.ends_with('~') {
        return false;
    }
    if path
        .components()
        .any(|c| IGNORED_DIRS.contains(&c.as_os_str().to_str().unwrap_or("")))
    {
        return false;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => config.supports_format(ext),
        None => false,
    }
}

/// Background filesystem watcher.
///
/// Dropping the handle stops the watcher; the pump task ends once the raw
/// event channel closes.
pub struct FileWatcher {
    // Held for its Drop side effect: deregisters the OS watches.
    _watcher: RecommendedWatcher,
    task: tokio::task::JoinHandle<()>,
}

impl FileWatcher {
    /// Start watching the configured sync root. Non-empty debounced batches
    /// send `JobTrigger::FileChange` into `trigger_tx` (coalesced by the
    /// scheduler's bounded channel).
    pub fn spawn(
        config: &SyncConfig,
        trigger_tx: mpsc::Sender<JobTrigger>,
    ) -> DaemonResult<Self> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    // Send failures mean the pump is gone; nothing to do.
                    let _ = raw_tx.send(event);
                }
                Err(err) => warn!(error = %err, "filesystem watcher error"),
            }
        })?;
        watcher.watch(&config.sync_root, RecursiveMode::Recursive)?;
        debug!(root = %config.sync_root.display(), "watching for file changes");

        let pump = EventPump {
            config: config.clone(),
            intake: ChangeIntake::new(DEFAULT_DEBOUNCE_WINDOW),
            trigger_tx,
        };
        let task = tokio::spawn(pump.run(raw_rx));

        Ok(Self { _watcher: watcher, task })
    }

    /// Stop the pump task (the OS watches stop when `self` drops)
    pub fn stop(self) {
        self.task.abort();
    }
}

struct EventPump {
    config: SyncConfig,
    intake: ChangeIntake,
    trigger_tx: mpsc::Sender<JobTrigger>,
}

impl EventPump {
    async fn run(mut self, mut raw_rx: mpsc::UnboundedReceiver<Event>) {
        let tick = self.intake.window() / 2;
        let mut interval = tokio::time::interval(tick.max(std::time::Duration::from_millis(50)));

        loop {
            tokio::select! {
                event = raw_rx.recv() => {
                    match event {
                        Some(event) => self.absorb(event),
                        None => break,
                    }
                }
                _ = interval.tick() => {
                    let ready = self.intake.drain_ready(Instant::now());
                    if !ready.is_empty() {
                        self.dispatch(ready);
                    }
                }
            }
        }
    }

    fn absorb(&mut self, event: Event) {
        let now = Instant::now();
        for change in map_event(&event) {
            if !is_eligible(&self.config, &change.path) {
                trace!(path = %change.path.display(), "ignoring ineligible path");
                continue;
            }
            self.intake.record(change.path, change.kind, now);
        }
    }

    fn dispatch(&self, batch: Vec<ChangeEvent>) {
        debug!(changes = batch.len(), "debounced change batch ready");
        // Capacity-1 channel: a trigger arriving while a pass runs is
        // queued once, additional ones are dropped.
        if self.trigger_tx.try_send(JobTrigger::FileChange).is_err() {
            trace!("pass trigger already queued");
        }
    }
}

/// Map one raw notify event onto logical change events
fn map_event(event: &Event) -> Vec<ChangeEvent> {
    match &event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|p| ChangeEvent { path: p.clone(), kind: ChangeKind::Created })
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| ChangeEvent { path: p.clone(), kind: ChangeKind::Deleted })
            .collect(),
        EventKind::Modify(ModifyKind::Name(_)) if event.paths.len() == 2 => {
            vec![ChangeEvent {
                path: event.paths[1].clone(),
                kind: ChangeKind::Moved { from: event.paths[0].clone() },
            }]
        }
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|p| ChangeEvent { path: p.clone(), kind: ChangeKind::Modified })
            .collect(),
        _ => Vec::new(),
    }
}

/// Scan the sync root for files eligible for synchronization
pub fn scan_eligible(config: &SyncConfig) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(&config.sync_root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_eligible(config, p))
        .collect();
    paths.sort();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_at(root: &Path) -> SyncConfig {
        let mut config = SyncConfig::default();
        config.sync_root = root.to_path_buf();
        config
    }

    #[test]
    fn eligibility_filters() {
        let config = SyncConfig::default();
        assert!(is_eligible(&config, Path::new("/root/notes.md")));
        assert!(is_eligible(&config, Path::new("/root/sub/page.TXT")));
        assert!(!is_eligible(&config, Path::new("/root/.hidden.md")));
        assert!(!is_eligible(&config, Path::new("/root/~autosave.md")));
        assert!(!is_eligible(&config, Path::new("/root/.git/config.md")));
        assert!(!is_eligible(&config, Path::new("/root/binary.exe")));
        assert!(!is_eligible(&config, Path::new("/root/Makefile")));
    }

    #[test]
    fn scan_finds_only_eligible_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), "a").unwrap();
        std::fs::write(dir.path().join("b.exe"), "b").unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/c.txt"), "c").unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/d.md"), "d").unwrap();

        let found = scan_eligible(&config_at(dir.path()));
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("a.md"));
        assert!(found[1].ends_with("sub/c.txt"));
    }
}
