//! Background synchronization engine: change intake, filesystem watching,
//! reconciliation, pass scheduling, and the JSON-backed local store.

pub mod error;
pub mod intake;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod watcher;

pub use error::{DaemonError, DaemonResult};
pub use intake::{ChangeEvent, ChangeIntake, ChangeKind, DEFAULT_DEBOUNCE_WINDOW};
pub use reconcile::{plan_action, CancelFlag, Reconciler};
pub use service::{SyncHandle, SyncService};
pub use store::JsonStore;
pub use watcher::{is_eligible, scan_eligible, FileWatcher};
