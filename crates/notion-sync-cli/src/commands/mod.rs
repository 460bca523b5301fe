//! CLI command implementations

use std::sync::Arc;

use anyhow::{Context, Result};

use notion_sync_client::NotionClient;
use notion_sync_core::config::SyncConfig;
use notion_sync_daemon::{JsonStore, Reconciler};

pub mod config;
pub mod status;
pub mod sync;
pub mod watch;

pub use config::execute as execute_config;
pub use status::execute as execute_status;
pub use sync::execute as execute_sync;
pub use watch::execute as execute_watch;

/// Integration token used for API calls
const TOKEN_ENV: &str = "NOTION_TOKEN";
/// Parent page under which new pages are created
const PARENT_PAGE_ENV: &str = "NOTION_PARENT_PAGE";

/// Wire up the store, API client, and reconciler from the configuration
pub(crate) fn build_engine(config: &SyncConfig) -> Result<(Reconciler, Arc<JsonStore>)> {
    let token = std::env::var(TOKEN_ENV)
        .with_context(|| format!("{TOKEN_ENV} must be set to a Notion integration token"))?;

    let mut client = NotionClient::new(token, config)?;
    if let Ok(parent) = std::env::var(PARENT_PAGE_ENV) {
        client = client.with_parent_page(parent);
    }

    std::fs::create_dir_all(&config.sync_root)
        .with_context(|| format!("cannot create sync root {}", config.sync_root.display()))?;

    let store = Arc::new(JsonStore::open(&config.database_url)?);
    let reconciler = Reconciler::new(config.clone(), store.clone(), Arc::new(client));
    Ok((reconciler, store))
}
