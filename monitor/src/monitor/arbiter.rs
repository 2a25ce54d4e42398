//! Completion arbitration
//!
//! The push channel and the status poller both observe the job finishing,
//! in either order and arbitrarily close together. The arbiter reconciles
//! the two into exactly one teardown and exactly one terminal
//! notification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::models::job::{DeploymentJob, JobPhase, PhaseReport};
use crate::monitor::events::{EventSink, MonitorEvent};
use crate::monitor::fsm::{LifecycleEvent, MonitorFsm};

/// Terminal outcome observed by one of the channels
#[derive(Debug, Clone)]
pub enum Outcome {
    Completed { exit_code: Option<i32> },
    Failed { exit_code: Option<i32>, message: String },
}

impl Outcome {
    /// Terminal outcome for a phase report, if its phase is terminal
    pub fn from_report(report: &PhaseReport) -> Option<Self> {
        match report.phase {
            JobPhase::Completed => Some(Outcome::Completed {
                exit_code: report.exit_code,
            }),
            JobPhase::Failed => Some(Outcome::Failed {
                exit_code: report.exit_code,
                message: match report.exit_code {
                    Some(code) => format!("provisioning run failed with exit code {}", code),
                    None => "provisioning run failed".to_string(),
                },
            }),
            _ => None,
        }
    }
}

/// Reconciles terminal signals into one idempotent teardown + notification
pub struct CompletionArbiter {
    settled: AtomicBool,
    job: Mutex<DeploymentJob>,
    fsm: Arc<Mutex<MonitorFsm>>,
    shutdown_tx: broadcast::Sender<()>,
    events: EventSink,
}

impl CompletionArbiter {
    pub fn new(
        job: DeploymentJob,
        fsm: Arc<Mutex<MonitorFsm>>,
        shutdown_tx: broadcast::Sender<()>,
        events: EventSink,
    ) -> Self {
        Self {
            settled: AtomicBool::new(false),
            job: Mutex::new(job),
            fsm,
            shutdown_tx,
            events,
        }
    }

    /// Apply a terminal outcome. The first observer wins; every later call
    /// is a no-op, regardless of which channel it came from.
    ///
    /// The whole step is synchronous: there is no suspension point between
    /// the flag flip and the teardown + notification.
    pub fn settle(&self, outcome: Outcome) {
        if self.settled.swap(true, Ordering::SeqCst) {
            debug!("Terminal signal ignored, already settled");
            return;
        }

        // Halt the transport, the log stream worker and the poller.
        let _ = self.shutdown_tx.send(());

        let job = {
            let mut job = self.job.lock().expect("job lock poisoned");
            job.completed_at = Some(Utc::now());
            match &outcome {
                Outcome::Completed { exit_code } => {
                    job.phase = JobPhase::Completed;
                    job.exit_code = *exit_code;
                }
                Outcome::Failed { exit_code, .. } => {
                    job.phase = JobPhase::Failed;
                    job.exit_code = *exit_code;
                }
            }
            job.clone()
        };

        match outcome {
            Outcome::Completed { .. } => {
                info!("Deployment completed for session {}", job.session_id);
                self.apply_fsm(LifecycleEvent::Complete);
                self.events.emit(MonitorEvent::Completed(job));
            }
            Outcome::Failed { message, .. } => {
                warn!("Deployment failed for session {}: {}", job.session_id, message);
                self.apply_fsm(LifecycleEvent::Fail(message.clone()));
                self.events.emit(MonitorEvent::Failed { job, message });
            }
        }
    }

    /// Mark the arbitration settled without a terminal notification.
    /// Returns false when a terminal signal (or an earlier cancel) already
    /// won the race.
    pub fn mark_cancelled(&self) -> bool {
        !self.settled.swap(true, Ordering::SeqCst)
    }

    /// Whether a terminal transition or cancellation already happened
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    /// Snapshot of the job record
    pub fn job(&self) -> DeploymentJob {
        self.job.lock().expect("job lock poisoned").clone()
    }

    fn apply_fsm(&self, event: LifecycleEvent) {
        let mut fsm = self.fsm.lock().expect("lifecycle lock poisoned");
        if let Err(e) = fsm.process(event) {
            warn!("Lifecycle transition rejected: {}", e);
        }
    }
}
