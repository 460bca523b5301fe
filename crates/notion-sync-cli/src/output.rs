//! Output formatting utilities for CLI

use console::style;

use notion_sync_core::item::{SyncItem, SyncStatus};
use notion_sync_core::job::{JobReport, JobStatus, OutcomeStatus, SyncEvent};

/// Format an item status with its conventional color
pub fn format_status(status: SyncStatus) -> String {
    match status {
        SyncStatus::Synced => style("synced").green().to_string(),
        SyncStatus::Syncing => style("syncing").cyan().to_string(),
        SyncStatus::Pending => style("pending").yellow().to_string(),
        SyncStatus::Conflicted => style("conflicted").magenta().to_string(),
        SyncStatus::Failed => style("failed").red().to_string(),
    }
}

pub fn format_job_status(status: JobStatus) -> String {
    match status {
        JobStatus::Success => style("success").green().to_string(),
        JobStatus::Partial => style("partial").yellow().to_string(),
        JobStatus::Failed => style("failed").red().to_string(),
        JobStatus::Cancelled => style("cancelled").dim().to_string(),
    }
}

/// One line per tracked item
pub fn print_item(item: &SyncItem) {
    let location = item
        .local_path
        .as_ref()
        .map(|p| p.display().to_string())
        .or_else(|| item.remote_id.clone())
        .unwrap_or_else(|| "?".to_string());
    let mut line = format!("{:10} {}", format_status(item.status), location);
    if let Some(err) = &item.last_error {
        line.push_str(&format!("  ({})", style(err).dim()));
    }
    println!("{line}");
}

/// Summary line plus per-status counts for a finished pass
pub fn print_report(report: &JobReport) {
    println!(
        "{} pass {} [{}]: {} items",
        style("sync").bold(),
        report.id,
        format_job_status(report.status),
        report.outcomes.len()
    );
    let counts = [
        ("completed", report.count(OutcomeStatus::Completed)),
        ("skipped", report.count(OutcomeStatus::Skipped)),
        ("conflicted", report.count(OutcomeStatus::Conflicted)),
        ("failed", report.count(OutcomeStatus::Failed)),
        ("deferred", report.count(OutcomeStatus::Pending)),
    ];
    for (label, count) in counts {
        if count > 0 {
            println!("  {label}: {count}");
        }
    }
}

/// Progress line for a live event stream
pub fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::JobStarted { trigger, total_items, .. } => {
            println!(
                "{} pass started ({:?}, {} items)",
                style("→").cyan(),
                trigger,
                total_items
            );
        }
        SyncEvent::ItemFinished { outcome, .. } => {
            if outcome.status != OutcomeStatus::Completed {
                println!(
                    "  {} item {} {:?}: {}",
                    style("!").yellow(),
                    outcome.item_id,
                    outcome.status,
                    outcome.error.as_deref().unwrap_or("")
                );
            }
        }
        SyncEvent::JobFinished { report } => print_report(report),
    }
}

pub fn format_error(msg: &str) -> String {
    style(format!("Error: {msg}")).red().to_string()
}

pub fn format_success(msg: &str) -> String {
    style(msg).green().to_string()
}
