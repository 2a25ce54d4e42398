//! Push log channel worker
//!
//! Consumes the transport's event stream and routes each decoded envelope:
//! log lines through the classifier to the consumer, terminal signals to
//! the completion arbiter, lifecycle changes to the consumer. Entries are
//! delivered in arrival order within a connection instance; a reconnect
//! may silently skip lines produced while disconnected.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::classify::classify;
use crate::models::envelope::{ClientMessage, Envelope};
use crate::models::log::LogEntry;
use crate::monitor::arbiter::{CompletionArbiter, Outcome};
use crate::monitor::events::{EventSink, MonitorEvent};
use crate::transport::reconnect::TransportEvent;

/// Run the push log channel worker.
///
/// Ends when the transport stops (shutdown or exhausted retry budget) and
/// its sender side closes.
pub async fn run(
    mut frames_rx: mpsc::UnboundedReceiver<TransportEvent>,
    outbound_tx: mpsc::UnboundedSender<ClientMessage>,
    arbiter: Arc<CompletionArbiter>,
    events: EventSink,
) {
    info!("Log stream worker starting...");

    let mut next_entry_id: u64 = 0;

    while let Some(event) = frames_rx.recv().await {
        match event {
            TransportEvent::Connected => {
                // Resync the phase display after any gap in coverage.
                let _ = outbound_tx.send(ClientMessage::GetStatus);
                events.emit(MonitorEvent::Connected);
            }
            TransportEvent::Disconnected { attempt } => {
                events.emit(MonitorEvent::Disconnected { attempt });
            }
            TransportEvent::Fatal { message } => {
                // The poller keeps running as the authoritative fallback.
                warn!("Push channel gave up: {}", message);
                events.emit(MonitorEvent::Error { message });
            }
            TransportEvent::Frame(envelope) => {
                handle_frame(envelope, &mut next_entry_id, &arbiter, &events);
            }
        }
    }

    debug!("Log stream worker stopped");
}

fn handle_frame(
    envelope: Envelope,
    next_entry_id: &mut u64,
    arbiter: &CompletionArbiter,
    events: &EventSink,
) {
    match envelope {
        Envelope::Log { data, .. } => {
            *next_entry_id += 1;
            let entry = LogEntry {
                id: *next_entry_id,
                timestamp: Utc::now(),
                severity: classify(&data.message),
                message: data.message.trim().to_string(),
                raw_source: data.message,
            };
            events.emit(MonitorEvent::Log(entry));
        }
        Envelope::Status { data, .. } => match Outcome::from_report(&data) {
            Some(outcome) => arbiter.settle(outcome),
            None => events.emit(MonitorEvent::Status(data)),
        },
        Envelope::Error { data, message, .. } => {
            // The service publishes error frames only when the
            // provisioning run itself blew up.
            let message = message
                .or_else(|| data.and_then(|d| d.error))
                .unwrap_or_else(|| "provisioning job reported an error".to_string());
            arbiter.settle(Outcome::Failed {
                exit_code: None,
                message,
            });
        }
        Envelope::Connected { session_id, .. } => {
            debug!("Stream acknowledged for session {:?}", session_id);
        }
        Envelope::CommandReceived { command, .. } => {
            debug!("Command acknowledged: {:?}", command);
        }
        // Heartbeats never leave the transport.
        Envelope::Ping { .. } | Envelope::Pong { .. } | Envelope::Command { .. } => {}
    }
}
