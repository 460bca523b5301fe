//! Change intake: debouncing and coalescing of raw filesystem events.
//!
//! Editors and sync tools produce bursts of events for a single logical
//! change (autosave storms, atomic-rename saves). The intake collapses all
//! events for one path inside a debounce window into a single change intent,
//! emitted once the path has been quiet for a full window.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::Instant;

/// Default quiet period before a coalesced change is released
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Kind of logical filesystem change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved { from: PathBuf },
}

/// One coalesced change intent for a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

#[derive(Debug)]
struct Entry {
    kind: ChangeKind,
    last_seen: Instant,
}

/// Accumulates raw events and releases deduplicated change intents in
/// first-seen order. Driven by an explicit clock so behavior is testable
/// without sleeping.
#[derive(Debug)]
pub struct ChangeIntake {
    window: Duration,
    entries: HashMap<PathBuf, Entry>,
    order: Vec<PathBuf>,
}

impl ChangeIntake {
    pub fn new(window: Duration) -> Self {
        Self { window, entries: HashMap::new(), order: Vec::new() }
    }

    /// Record a raw event at time `now`, coalescing with any pending entry
    /// for the same path
    pub fn record(&mut self, path: PathBuf, kind: ChangeKind, now: Instant) {
        match self.entries.get_mut(&path) {
            None => {
                self.entries.insert(path.clone(), Entry { kind, last_seen: now });
                self.order.push(path);
            }
            Some(entry) => match merge(&entry.kind, kind) {
                Some(merged) => {
                    entry.kind = merged;
                    entry.last_seen = now;
                }
                // Create followed by delete inside the window: nothing
                // ever happened as far as the remote is concerned.
                None => {
                    self.entries.remove(&path);
                    self.order.retain(|p| p != &path);
                }
            },
        }
    }

    /// Release entries that have been quiet for a full window, in the order
    /// their paths were first seen
    pub fn drain_ready(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let mut ready = Vec::new();
        let window = self.window;
        let entries = &mut self.entries;
        self.order.retain(|path| {
            let quiet = entries
                .get(path)
                .map_or(true, |e| now.duration_since(e.last_seen) >= window);
            if quiet {
                if let Some(entry) = entries.remove(path) {
                    ready.push(ChangeEvent { path: path.clone(), kind: entry.kind });
                }
            }
            !quiet
        });
        ready
    }

    /// Number of pending (not yet released) changes
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured debounce window
    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Coalesce a new raw event into the pending kind for the same path.
/// `None` means the pair cancels out entirely.
fn merge(pending: &ChangeKind, incoming: ChangeKind) -> Option<ChangeKind> {
    use ChangeKind::*;
    match (pending, incoming) {
        (Created, Deleted) => None,
        (Created, _) => Some(Created),
        (Deleted, Created) | (Deleted, Modified) => Some(Modified),
        (_, Deleted) => Some(Deleted),
        (Moved { from }, Modified) => Some(Moved { from: from.clone() }),
        (_, incoming) => Some(incoming),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake() -> ChangeIntake {
        ChangeIntake::new(Duration::from_millis(500))
    }

    #[tokio::test(start_paused = true)]
    async fn autosave_storm_collapses_to_one_change() {
        let mut intake = intake();
        let path = PathBuf::from("notes.md");

        for _ in 0..10 {
            intake.record(path.clone(), ChangeKind::Modified, Instant::now());
            tokio::time::advance(Duration::from_millis(20)).await;
        }
        assert_eq!(intake.pending(), 1);

        tokio::time::advance(Duration::from_millis(500)).await;
        let ready = intake.drain_ready(Instant::now());
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].kind, ChangeKind::Modified);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_released_before_quiet_period() {
        let mut intake = intake();
        intake.record("a.md".into(), ChangeKind::Modified, Instant::now());

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(intake.drain_ready(Instant::now()).is_empty());

        tokio::time::advance(Duration::from_millis(300)).await;
        assert_eq!(intake.drain_ready(Instant::now()).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn create_then_delete_cancels() {
        let mut intake = intake();
        let now = Instant::now();
        intake.record("tmp.md".into(), ChangeKind::Created, now);
        intake.record("tmp.md".into(), ChangeKind::Deleted, now);
        assert!(intake.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn create_then_modify_stays_create() {
        let mut intake = intake();
        let now = Instant::now();
        intake.record("new.md".into(), ChangeKind::Created, now);
        intake.record("new.md".into(), ChangeKind::Modified, now);

        tokio::time::advance(Duration::from_secs(1)).await;
        let ready = intake.drain_ready(Instant::now());
        assert_eq!(ready[0].kind, ChangeKind::Created);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_then_create_becomes_modify() {
        let mut intake = intake();
        let now = Instant::now();
        intake.record("doc.md".into(), ChangeKind::Deleted, now);
        intake.record("doc.md".into(), ChangeKind::Created, now);

        tokio::time::advance(Duration::from_secs(1)).await;
        let ready = intake.drain_ready(Instant::now());
        assert_eq!(ready[0].kind, ChangeKind::Modified);
    }

    #[tokio::test(start_paused = true)]
    async fn first_seen_order_is_preserved() {
        let mut intake = intake();
        let now = Instant::now();
        intake.record("b.md".into(), ChangeKind::Modified, now);
        intake.record("a.md".into(), ChangeKind::Modified, now);
        intake.record("b.md".into(), ChangeKind::Modified, now);

        tokio::time::advance(Duration::from_secs(1)).await;
        let ready = intake.drain_ready(Instant::now());
        let paths: Vec<_> = ready.iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("b.md"), PathBuf::from("a.md")]);
    }
}
