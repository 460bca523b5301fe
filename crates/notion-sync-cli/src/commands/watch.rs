use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

use notion_sync_core::config::SyncConfig;
use notion_sync_core::job::JobTrigger;
use notion_sync_daemon::{FileWatcher, SyncService};

use crate::output;

/// Execute the watch command: run the background service and filesystem
/// watcher until interrupted
pub async fn execute(config: &SyncConfig) -> Result<()> {
    let (reconciler, _store) = super::build_engine(config)?;
    let (service, handle) = SyncService::new(reconciler);

    let mut events = handle.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => output::print_event(&event),
                // Dropped events only cost progress lines.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let task = service.spawn();
    let watcher = FileWatcher::spawn(config, handle.trigger_sender())?;
    info!(root = %config.sync_root.display(), "watching; press ctrl-c to stop");

    // Catch up on anything that changed while we were not running.
    handle.request_sync(JobTrigger::Manual);

    tokio::signal::ctrl_c().await?;
    println!("{}", output::format_success("shutting down"));

    watcher.stop();
    handle.shutdown().await;
    task.await?;
    printer.abort();
    Ok(())
}
