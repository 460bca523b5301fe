//! Background sync service.
//!
//! Drives reconciliation passes from two sources: a fixed-interval timer and
//! the debounced file-change trigger. Passes never overlap; the service loop
//! runs one at a time and the bounded trigger channel coalesces requests that
//! arrive mid-pass.

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, trace};

use notion_sync_core::job::{JobTrigger, SyncEvent};

use crate::reconcile::{CancelFlag, Reconciler};

/// Control surface for a running [`SyncService`].
///
/// Cheap to clone; every clone talks to the same service task.
#[derive(Clone)]
pub struct SyncHandle {
    trigger_tx: mpsc::Sender<JobTrigger>,
    shutdown_tx: mpsc::Sender<()>,
    cancel: CancelFlag,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncHandle {
    /// Request a pass. Returns `false` when one is already queued, in which
    /// case the queued pass covers this request too.
    pub fn request_sync(&self, trigger: JobTrigger) -> bool {
        self.trigger_tx.try_send(trigger).is_ok()
    }

    /// Channel for the watcher to feed change triggers into
    pub fn trigger_sender(&self) -> mpsc::Sender<JobTrigger> {
        self.trigger_tx.clone()
    }

    /// Cancel the in-flight pass, if any, at the next item boundary
    pub fn cancel_current(&self) {
        self.cancel.cancel();
    }

    /// Subscribe to progress events from running passes
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Ask the service loop to exit after the current pass
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Owns the pass scheduling loop
pub struct SyncService {
    reconciler: Reconciler,
    trigger_rx: mpsc::Receiver<JobTrigger>,
    shutdown_rx: mpsc::Receiver<()>,
    cancel: CancelFlag,
}

impl SyncService {
    /// Create the service and its control handle. Nothing runs until
    /// [`SyncService::spawn`].
    pub fn new(reconciler: Reconciler) -> (Self, SyncHandle) {
        // Capacity 1: triggers arriving while a pass runs collapse into a
        // single queued pass.
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let cancel = CancelFlag::new();

        let handle = SyncHandle {
            trigger_tx,
            shutdown_tx,
            cancel: cancel.clone(),
            events: reconciler.event_sender(),
        };
        let service = Self { reconciler, trigger_rx, shutdown_rx, cancel };
        (service, handle)
    }

    /// Spawn the scheduling loop onto the runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let period = self.reconciler.config().sync_interval();
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "sync service started");

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("sync service shutting down");
                    break;
                }
                _ = timer.tick() => {
                    self.run_pass(JobTrigger::Interval).await;
                }
                Some(trigger) = self.trigger_rx.recv() => {
                    self.run_pass(trigger).await;
                    // A pass covers all changes up to its start; push the
                    // next interval tick out a full period.
                    timer.reset();
                }
            }
        }
    }

    async fn run_pass(&self, trigger: JobTrigger) {
        self.cancel.clear();
        trace!(?trigger, "starting reconciliation pass");
        if let Err(err) = self.reconciler.run_pass(trigger, &self.cancel).await {
            error!(error = %err, "reconciliation pass aborted");
        }
    }
}
