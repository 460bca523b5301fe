//! Core types and traits for the Notion sync client.
//!
//! This crate provides the fundamental types, traits, and configuration that
//! are used throughout the notion-sync workspace: the error taxonomy, the
//! `SyncItem`/`JobReport` data model, and the `RemoteClient`/`LocalStore`
//! seams the reconciliation engine is built against.

pub mod config;
pub mod error;
pub mod item;
pub mod job;
pub mod remote;
pub mod store;

// Re-export commonly used types
pub use crate::config::SyncConfig;
pub use crate::error::{SyncError, SyncResult};
pub use crate::item::{content_fingerprint, file_fingerprint, SyncAction, SyncItem, SyncStatus};
pub use crate::job::{
    ItemOutcome, JobReport, JobStatus, JobTrigger, OutcomeStatus, SyncEvent,
};
pub use crate::remote::{RemoteClient, RemoteDocument, RemoteMeta};
pub use crate::store::{LocalStore, MemoryStore};
