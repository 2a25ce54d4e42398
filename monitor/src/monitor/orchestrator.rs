//! Job launch orchestration
//!
//! Three sequential remote calls create the session, its job
//! specification and the job itself; a failure anywhere aborts the
//! sequence with a typed error and leaves already-created remote
//! resources alone — retry means re-running the whole sequence. On
//! success the transport, the log stream worker and the status poller
//! are spawned together and a handle is returned to the consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{info, warn};

use crate::errors::{LaunchStep, MonitorError};
use crate::http::client::HttpClient;
use crate::http::sessions::VmClusterConfig;
use crate::models::envelope::ClientMessage;
use crate::models::job::DeploymentJob;
use crate::monitor::arbiter::CompletionArbiter;
use crate::monitor::events::{EventSink, MonitorEvent};
use crate::monitor::fsm::{LifecycleEvent, MonitorFsm, MonitorState};
use crate::transport::reconnect::{self, ChannelState, TransportOptions};
use crate::workers::{log_stream, poller};

/// Parameters for launching a deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchParams {
    pub question_set_id: String,

    pub vm_config_id: String,

    /// Resolved node layout for the session cluster
    pub vm_config: VmClusterConfig,

    /// Playbook driving the provisioning run
    #[serde(default = "default_playbook")]
    pub playbook: String,
}

fn default_playbook() -> String {
    "cluster.yml".to_string()
}

/// Monitor tuning
#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    pub transport: TransportOptions,

    pub poller: poller::Options,
}

/// Launcher for monitored deployments
pub struct DeploymentMonitor;

impl DeploymentMonitor {
    /// Launch a provisioning job and start monitoring it.
    ///
    /// Returns the handle plus the event queue the consumer drains. Any
    /// launch failure aborts with `MonitorError::Launch` and performs no
    /// cleanup of already-created remote resources.
    pub async fn launch(
        api: Arc<HttpClient>,
        params: LaunchParams,
        options: MonitorOptions,
    ) -> Result<(MonitorHandle, mpsc::UnboundedReceiver<MonitorEvent>), MonitorError> {
        let fsm = Arc::new(Mutex::new(MonitorFsm::new()));
        apply(&fsm, LifecycleEvent::Launch);

        // 1. Register the exam session
        let session = match api
            .register_session(&params.question_set_id, &params.vm_config_id)
            .await
        {
            Ok(session) => session,
            Err(e) => return Err(abort(&fsm, LaunchStep::RegisterSession, e)),
        };
        info!("Session registered: {}", session.id);

        // 2. Generate the job specification
        let spec = match api
            .generate_job_spec(&session.id, &params.vm_config, &params.question_set_id)
            .await
        {
            Ok(spec) => spec,
            Err(e) => return Err(abort(&fsm, LaunchStep::GenerateSpec, e)),
        };
        info!("Job specification generated at {}", spec.inventory_path);

        // 3. Start the provisioning job
        let started = match api.start_job(&session.id, &params.playbook).await {
            Ok(started) => started,
            Err(e) => return Err(abort(&fsm, LaunchStep::StartJob, e)),
        };

        let job = DeploymentJob {
            id: started.session_id.clone(),
            session_id: session.id.clone(),
            phase: started.status,
            started_at: Utc::now(),
            completed_at: None,
            exit_code: None,
        };

        // Wire the event queue, teardown signal and channel plumbing
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        let sink = EventSink::new(alive.clone(), events_tx);
        let (shutdown_tx, _) = broadcast::channel(1);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::default());

        let arbiter = Arc::new(CompletionArbiter::new(
            job,
            fsm.clone(),
            shutdown_tx.clone(),
            sink.clone(),
        ));

        let stream_url = reconnect::build_stream_url(api.base_url(), &started.log_stream_url)?;

        // Reconnecting transport
        let transport_options = options.transport.clone();
        let transport_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            reconnect::run(
                &transport_options,
                stream_url,
                outbound_rx,
                frames_tx,
                state_tx,
                transport_shutdown,
            )
            .await;
        });

        // Push log channel worker
        let stream_arbiter = arbiter.clone();
        let stream_sink = sink.clone();
        let stream_outbound = outbound_tx.clone();
        tokio::spawn(async move {
            log_stream::run(frames_rx, stream_outbound, stream_arbiter, stream_sink).await;
        });

        // Status poller
        let poller_options = options.poller.clone();
        let poller_api = api.clone();
        let poller_session = session.id.clone();
        let poller_arbiter = arbiter.clone();
        let poller_sink = sink.clone();
        let mut poller_shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move {
            poller::run(
                &poller_options,
                poller_api,
                &poller_session,
                poller_arbiter,
                poller_sink,
                tokio::time::sleep,
                Box::pin(async move {
                    let _ = poller_shutdown.recv().await;
                }),
            )
            .await;
        });

        apply(&fsm, LifecycleEvent::LaunchSucceeded);
        info!("Monitoring deployment for session {}", session.id);

        let handle = MonitorHandle {
            fsm,
            alive,
            shutdown_tx,
            arbiter,
            outbound_tx,
            state_rx,
        };
        Ok((handle, events_rx))
    }
}

/// Handle to a live monitored deployment
pub struct MonitorHandle {
    fsm: Arc<Mutex<MonitorFsm>>,
    alive: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    arbiter: Arc<CompletionArbiter>,
    outbound_tx: mpsc::UnboundedSender<ClientMessage>,
    state_rx: watch::Receiver<ChannelState>,
}

impl MonitorHandle {
    /// Cancel monitoring and tear everything down.
    ///
    /// Idempotent and synchronous. The liveness flag is lowered before the
    /// shutdown broadcast, so any callback already queued behind a
    /// suspension point is a no-op by the time it runs; after this
    /// returns, no further event reaches the consumer. A no-op when the
    /// job already settled.
    pub fn cancel(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if !self.arbiter.mark_cancelled() {
            return;
        }
        let _ = self.shutdown_tx.send(());
        apply(&self.fsm, LifecycleEvent::Cancel);
        info!("Deployment monitor cancelled");
    }

    /// Current lifecycle state
    pub fn state(&self) -> MonitorState {
        self.fsm.lock().expect("lifecycle lock poisoned").state()
    }

    /// Snapshot of the job record
    pub fn job(&self) -> DeploymentJob {
        self.arbiter.job()
    }

    /// Observable state of the push channel connection
    pub fn channel_state(&self) -> ChannelState {
        self.state_rx.borrow().clone()
    }

    /// Whether the job reached a terminal transition (or was cancelled)
    pub fn is_settled(&self) -> bool {
        self.arbiter.is_settled()
    }

    /// Send a control command over the push channel; the service
    /// acknowledges it with a `command_received` frame.
    pub fn send_command(&self, command: impl Into<String>) {
        let _ = self.outbound_tx.send(ClientMessage::Command {
            command: command.into(),
        });
    }
}

fn abort(fsm: &Arc<Mutex<MonitorFsm>>, step: LaunchStep, cause: MonitorError) -> MonitorError {
    let message = cause.to_string();
    apply(fsm, LifecycleEvent::LaunchFailed(message.clone()));
    MonitorError::Launch { step, message }
}

fn apply(fsm: &Arc<Mutex<MonitorFsm>>, event: LifecycleEvent) {
    let mut fsm = fsm.lock().expect("lifecycle lock poisoned");
    if let Err(e) = fsm.process(event) {
        warn!("Lifecycle transition rejected: {}", e);
    }
}
