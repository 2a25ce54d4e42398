//! Status polling worker
//!
//! The availability-preserving fallback to the push channel: a
//! point-in-time phase query at fixed cadence, independent of the log
//! stream's health.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::http::client::HttpClient;
use crate::monitor::arbiter::{CompletionArbiter, Outcome};
use crate::monitor::events::{EventSink, MonitorEvent};

/// Poller worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling cadence
    pub cadence: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cadence: Duration::from_secs(10),
        }
    }
}

/// Run the status poller.
///
/// Queries the job phase immediately and then on every cadence tick.
/// Individual query failures are swallowed and retried on the next tick;
/// the poller never enters a failure state of its own. A terminal phase
/// reports to the completion arbiter and ends the cadence permanently.
pub async fn run<S, F>(
    options: &Options,
    api: Arc<HttpClient>,
    session_id: &str,
    arbiter: Arc<CompletionArbiter>,
    events: EventSink,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Status poller starting...");

    loop {
        match api.query_phase(session_id).await {
            Ok(report) => {
                if report.phase.is_terminal() {
                    info!("Poller observed terminal phase: {}", report.phase);
                    if let Some(outcome) = Outcome::from_report(&report) {
                        arbiter.settle(outcome);
                    }
                    return;
                }
                debug!("Job phase: {}", report.phase);
                events.emit(MonitorEvent::Status(report));
            }
            Err(e) => {
                warn!("Phase query failed, retrying next tick: {}", e);
            }
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Status poller shutting down...");
                return;
            }
            _ = sleep_fn(options.cadence) => {}
        }
    }
}
