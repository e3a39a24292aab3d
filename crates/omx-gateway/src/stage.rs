//! Update-processing stage.
//!
//! Sole consumer of the execution-report channel; feeds the context
//! manager and exposes the lifecycle hooks that swap the manager
//! between normal and recovery handling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use omx_core::ExecutionReport;
use omx_lifecycle::{LifecycleChild, LifecycleController, LifecycleHooks};
use omx_reconcile::OrderContextManager;

/// The reconciliation stage as an orchestrated lifecycle child.
pub struct UpdateStage {
    name: String,
    manager: Arc<OrderContextManager>,
    controller: LifecycleController,
    report_tx: mpsc::UnboundedSender<ExecutionReport>,
    submitted: AtomicU64,
    processed: Arc<AtomicU64>,
    shutdown: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct StageHooks {
    manager: Arc<OrderContextManager>,
}

impl LifecycleHooks for StageHooks {
    fn on_warmup_enter(&self) {
        self.manager.warmup();
    }

    fn on_recovery_enter(&self) {
        self.manager.recover();
    }

    fn on_active_enter(&self) {
        self.manager.activate();
    }

    fn on_pending_reset(&self) -> Result<(), String> {
        self.manager.reset();
        Ok(())
    }
}

impl UpdateStage {
    /// The inbound report channel. Single producer per source; the
    /// stage task is the only consumer.
    pub fn submit(&self, report: ExecutionReport) {
        if self.report_tx.send(report).is_err() {
            warn!(name = %self.name, "Update stage is gone, report dropped");
            return;
        }
        self.submitted.fetch_add(1, Ordering::AcqRel);
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<OrderContextManager> {
        &self.manager
    }

    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    /// Wait until every submitted report has been processed, bounded
    /// by `timeout`. Returns false on timeout.
    pub async fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.processed() < self.submitted() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        true
    }
}

impl LifecycleChild for UpdateStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    fn is_clear(&self) -> bool {
        self.manager.is_clear()
    }

    fn begin_disruptive_stop(&self) {
        self.shutdown.notify_waiters();
        self.shutdown.notify_one();
    }

    fn is_stopped(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map_or(true, |task| task.is_finished())
    }
}

/// Spawn the stage task on the current tokio runtime.
#[must_use]
pub fn spawn_update_stage(name: impl Into<String>, manager: Arc<OrderContextManager>) -> Arc<UpdateStage> {
    let name = name.into();
    let (report_tx, mut report_rx) = mpsc::unbounded_channel::<ExecutionReport>();
    let processed = Arc::new(AtomicU64::new(0));
    let shutdown = Arc::new(Notify::new());

    let task_manager = Arc::clone(&manager);
    let task_processed = Arc::clone(&processed);
    let task_shutdown = Arc::clone(&shutdown);
    let task_name = name.clone();
    let task = tokio::spawn(async move {
        info!(name = %task_name, "Update stage started");
        loop {
            tokio::select! {
                report = report_rx.recv() => {
                    match report {
                        Some(report) => {
                            task_manager.handle(report);
                            task_processed.fetch_add(1, Ordering::AcqRel);
                        }
                        None => break,
                    }
                }
                () = task_shutdown.notified() => break,
            }
        }
        info!(name = %task_name, "Update stage exited");
    });

    let controller = LifecycleController::new(
        format!("{name}-lifecycle"),
        Box::new(StageHooks {
            manager: Arc::clone(&manager),
        }),
    );

    Arc::new(UpdateStage {
        name,
        manager,
        controller,
        report_tx,
        submitted: AtomicU64::new(0),
        processed,
        shutdown,
        task: Mutex::new(Some(task)),
    })
}
