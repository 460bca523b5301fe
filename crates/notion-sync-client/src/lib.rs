//! Rate-limited Notion API client.
//!
//! Wraps the Notion REST API behind the [`RemoteClient`] trait from
//! `notion-sync-core`, with request throttling, transient-failure retry, and
//! the OAuth code exchange.
//!
//! [`RemoteClient`]: notion_sync_core::remote::RemoteClient

pub mod api;
pub mod auth;
pub mod rate_limit;
pub mod retry;

pub use api::NotionClient;
pub use auth::{OAuthFlow, OAuthTokens};
pub use rate_limit::RateLimiter;
pub use retry::{Backoff, RetryPolicy};
