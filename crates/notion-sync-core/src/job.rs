use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::item::SyncAction;

/// What started a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTrigger {
    /// The fixed-interval scheduler
    Interval,
    /// A non-empty batch from the change intake
    FileChange,
    /// An explicit user request
    Manual,
}

/// Overall result of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Every eligible item completed or was a no-op
    Success,
    /// At least one item failed while others completed
    Partial,
    /// A pass-fatal error aborted remaining work
    Failed,
    /// The pass was cancelled between items
    Cancelled,
}

/// Outcome status for a single item within a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The planned action executed successfully
    Completed,
    /// The item was filtered out before any remote call (validation)
    Skipped,
    /// Both sides changed; surfaced for manual resolution
    Conflicted,
    /// The action surfaced a terminal error
    Failed,
    /// Deferred to the next pass (cancellation or pass-fatal abort)
    Pending,
}

/// Per-item result recorded into the job report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: Uuid,
    pub action: SyncAction,
    pub status: OutcomeStatus,
    pub error: Option<String>,
}

impl ItemOutcome {
    pub fn completed(item_id: Uuid, action: SyncAction) -> Self {
        Self { item_id, action, status: OutcomeStatus::Completed, error: None }
    }

    pub fn skipped(item_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            item_id,
            action: SyncAction::Noop,
            status: OutcomeStatus::Skipped,
            error: Some(reason.into()),
        }
    }

    pub fn conflicted(item_id: Uuid, detail: impl Into<String>) -> Self {
        Self {
            item_id,
            action: SyncAction::Conflict,
            status: OutcomeStatus::Conflicted,
            error: Some(detail.into()),
        }
    }

    pub fn failed(item_id: Uuid, action: SyncAction, error: impl Into<String>) -> Self {
        Self { item_id, action, status: OutcomeStatus::Failed, error: Some(error.into()) }
    }

    pub fn pending(item_id: Uuid) -> Self {
        Self { item_id, action: SyncAction::Noop, status: OutcomeStatus::Pending, error: None }
    }
}

/// Report of one completed reconciliation pass, persisted to job history.
///
/// The sync engine owns job lifecycle exclusively: a report is created when a
/// pass is triggered and archived through the local store on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub id: Uuid,
    pub trigger: JobTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<ItemOutcome>,
    pub status: JobStatus,
}

impl JobReport {
    /// Start a new pass report
    pub fn begin(trigger: JobTrigger) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger,
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
            status: JobStatus::Success,
        }
    }

    /// Record an item outcome
    pub fn record(&mut self, outcome: ItemOutcome) {
        self.outcomes.push(outcome);
    }

    /// Close the report, deriving the overall status from the outcomes unless
    /// a pass-level status (`Failed`, `Cancelled`) was already imposed.
    pub fn finish(&mut self, imposed: Option<JobStatus>) {
        self.finished_at = Some(Utc::now());
        self.status = match imposed {
            Some(status) => status,
            None => {
                let failed = self
                    .outcomes
                    .iter()
                    .filter(|o| o.status == OutcomeStatus::Failed)
                    .count();
                if failed == 0 {
                    JobStatus::Success
                } else if failed == self.outcomes.len() {
                    JobStatus::Failed
                } else {
                    JobStatus::Partial
                }
            }
        };
    }

    /// Number of outcomes with the given status
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// Progress record published by the engine while a pass runs.
///
/// Any consumer (CLI, GUI) subscribes to these over a broadcast channel; the
/// engine has no knowledge of its subscribers.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    JobStarted { job_id: Uuid, trigger: JobTrigger, total_items: usize },
    ItemFinished { job_id: Uuid, outcome: ItemOutcome },
    JobFinished { report: JobReport },
}
