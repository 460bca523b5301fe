use anyhow::Result;

use notion_sync_core::config::SyncConfig;
use notion_sync_core::store::LocalStore;
use notion_sync_daemon::JsonStore;

use crate::output;

/// Execute the status command: tracked items plus recent pass history
pub async fn execute(config: &SyncConfig, history: usize) -> Result<()> {
    let store = JsonStore::open(&config.database_url)?;

    let items = store.load_items().await?;
    if items.is_empty() {
        println!("No tracked items (store: {})", config.database_url.display());
    } else {
        println!("Tracked items ({}):", items.len());
        for item in &items {
            output::print_item(item);
        }
    }

    let reports = store.job_history(history).await?;
    if !reports.is_empty() {
        println!("\nRecent passes:");
        for report in &reports {
            let finished = report
                .finished_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {} {:9} {} items ({:?})",
                finished,
                output::format_job_status(report.status),
                report.outcomes.len(),
                report.trigger
            );
        }
    }
    Ok(())
}
