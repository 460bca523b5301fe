use anyhow::Result;
use tracing::debug;

use notion_sync_core::config::SyncConfig;
use notion_sync_core::job::JobTrigger;
use notion_sync_daemon::CancelFlag;

use crate::output;

/// Execute the sync command: one reconciliation pass, then exit
pub async fn execute(config: &SyncConfig) -> Result<()> {
    debug!(root = %config.sync_root.display(), "running single pass");
    let (reconciler, _store) = super::build_engine(config)?;

    let report = reconciler
        .run_pass(JobTrigger::Manual, &CancelFlag::new())
        .await?;
    output::print_report(&report);
    Ok(())
}
