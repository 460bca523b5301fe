//! Notion file synchronization client.
//!
//! Keeps a local directory and a set of Notion pages in agreement through
//! periodic and change-triggered reconciliation passes. The binary goes
//! through the CLI crate; library consumers embed the engine directly.

pub use notion_sync_client as client;
pub use notion_sync_core as core;
pub use notion_sync_daemon as daemon;

pub use notion_sync_core::config::SyncConfig;
pub use notion_sync_core::error::{SyncError, SyncResult};

/// Version of the notion-sync system
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
