//! Monitor event queue
//!
//! Consumer callbacks are modeled as an explicit queue: workers emit
//! `MonitorEvent`s through a liveness-gated sink, the consumer drains one
//! `UnboundedReceiver`. Sends are synchronous, so emission never suspends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::models::job::{DeploymentJob, PhaseReport};
use crate::models::log::LogEntry;

/// Events delivered to the consumer
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// Push channel established
    Connected,

    /// Push channel lost; a reconnect is in progress
    Disconnected { attempt: u32 },

    /// A classified provisioning log line
    Log(LogEntry),

    /// Non-terminal phase update
    Status(PhaseReport),

    /// Non-terminal error surface (e.g. exhausted reconnect budget while
    /// the poller keeps watching)
    Error { message: String },

    /// Job finished successfully; emitted exactly once
    Completed(DeploymentJob),

    /// Job failed; emitted exactly once
    Failed { job: DeploymentJob, message: String },
}

/// Liveness-gated sender for monitor events.
///
/// Every send checks the liveness flag first: once `cancel()` lowers it,
/// work that was already queued behind a suspension point becomes a no-op
/// instead of reaching the consumer.
#[derive(Clone)]
pub struct EventSink {
    alive: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<MonitorEvent>,
}

impl EventSink {
    pub fn new(alive: Arc<AtomicBool>, tx: mpsc::UnboundedSender<MonitorEvent>) -> Self {
        Self { alive, tx }
    }

    /// Emit an event unless the monitor was torn down
    pub fn emit(&self, event: MonitorEvent) {
        if !self.alive.load(Ordering::SeqCst) {
            debug!("Discarding event after teardown");
            return;
        }
        let _ = self.tx.send(event);
    }
}
