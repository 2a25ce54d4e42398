//! Reconnecting WebSocket transport for the deployment log stream
//!
//! Owns the connect / heartbeat / backoff / reconnect state machine.
//! Decoded frames and lifecycle changes are emitted toward the push log
//! channel worker; observable connection state is published over a watch
//! channel.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::errors::MonitorError;
use crate::models::envelope::{ClientMessage, Envelope};
use crate::transport::backoff::ReconnectPolicy;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport options
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Reconnect backoff schedule
    pub backoff: ReconnectPolicy,

    /// Consecutive connect failures tolerated before giving up
    pub max_attempts: u32,

    /// Heartbeat send interval
    pub heartbeat_interval: Duration,

    /// How long to wait for a heartbeat acknowledgement before the
    /// connection is treated as stale
    pub heartbeat_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            backoff: ReconnectPolicy::default(),
            max_attempts: 10,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
        }
    }
}

/// Connection status of the push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// Observable state of the push channel connection
#[derive(Debug, Clone)]
pub struct ChannelState {
    pub status: ChannelStatus,

    /// Consecutive failed connection attempts; reset to 0 on every
    /// successful connect
    pub attempt: u32,

    /// When the last heartbeat acknowledgement arrived
    pub last_heartbeat_at: Option<DateTime<Utc>>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            status: ChannelStatus::Connecting,
            attempt: 0,
            last_heartbeat_at: None,
        }
    }
}

/// Events emitted by the transport toward the push log channel worker
#[derive(Debug)]
pub enum TransportEvent {
    /// Connection established; the failure counter was reset
    Connected,

    /// Connection lost; a reconnect is scheduled (attempt = consecutive
    /// failures so far)
    Disconnected { attempt: u32 },

    /// Retry budget exhausted; the transport has stopped and only an
    /// explicit relaunch restarts it
    Fatal { message: String },

    /// A decoded inbound frame
    Frame(Envelope),
}

/// Derive the websocket endpoint from the HTTP base URL and the stream
/// path returned by the deploy call.
pub fn build_stream_url(base_url: &str, stream_path: &str) -> Result<Url, MonitorError> {
    let mut url = Url::parse(base_url).map_err(|e| MonitorError::Config(e.to_string()))?;

    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Err(MonitorError::Config("Invalid base URL scheme".to_string())),
    };

    url.set_scheme(scheme)
        .map_err(|_| MonitorError::Config("Failed to set scheme".to_string()))?;
    url.set_path(stream_path);

    Ok(url)
}

/// Run the transport task.
///
/// Reconnects with exponential backoff until the failure cap, sends
/// heartbeats, decodes inbound envelopes and forwards everything the
/// worker cares about. Returns when shut down or when the retry budget is
/// exhausted.
pub async fn run(
    options: &TransportOptions,
    url: Url,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    state_tx: watch::Sender<ChannelState>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!("Transport starting: {}", url);

    // Consecutive connect failures; reconnect attempts scheduled since the
    // last successful connection.
    let mut failures: u32 = 0;
    let mut scheduled: u32 = 0;

    loop {
        set_state(&state_tx, ChannelStatus::Connecting, failures);

        let connection = tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Transport shutting down...");
                return;
            }
            connection = connect_async(url.as_str()) => connection,
        };

        match connection {
            Ok((mut ws_stream, _)) => {
                failures = 0;
                scheduled = 0;
                info!("Push channel connected");
                set_state(&state_tx, ChannelStatus::Connected, 0);
                let _ = events_tx.send(TransportEvent::Connected);

                match drive(options, &mut ws_stream, &mut outbound_rx, &events_tx, &state_tx, &mut shutdown_rx).await {
                    DropReason::Shutdown => {
                        let _ = ws_stream.close(None).await;
                        info!("Transport shutting down...");
                        return;
                    }
                    DropReason::Dropped => {
                        warn!("Push channel connection lost");
                    }
                    DropReason::Stale => {
                        warn!("Heartbeat timed out, dropping stale connection");
                        let _ = ws_stream.close(None).await;
                    }
                }
            }
            Err(e) => {
                failures += 1;
                warn!(
                    "Connect attempt failed ({}/{}): {}",
                    failures, options.max_attempts, e
                );
                if failures >= options.max_attempts {
                    error!("Push channel retry budget exhausted");
                    set_state(&state_tx, ChannelStatus::Error, failures);
                    let _ = events_tx.send(TransportEvent::Fatal {
                        message: format!(
                            "log stream connection failed after {} attempts: {}",
                            failures, e
                        ),
                    });
                    return;
                }
            }
        }

        set_state(&state_tx, ChannelStatus::Disconnected, failures);
        let _ = events_tx.send(TransportEvent::Disconnected { attempt: failures });

        scheduled += 1;
        let delay = options.backoff.delay(scheduled);
        debug!("Reconnecting in {:?}", delay);
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Transport shutting down...");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

enum DropReason {
    Shutdown,
    Dropped,
    Stale,
}

/// Drive one live connection until it drops, goes stale or is shut down
async fn drive(
    options: &TransportOptions,
    ws_stream: &mut WsStream,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientMessage>,
    events_tx: &mpsc::UnboundedSender<TransportEvent>,
    state_tx: &watch::Sender<ChannelState>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> DropReason {
    // First beat one full interval after connect, so a fresh connection is
    // never immediately declared stale.
    let mut heartbeat = tokio::time::interval_at(
        Instant::now() + options.heartbeat_interval,
        options.heartbeat_interval,
    );
    let mut awaiting_pong = false;
    let mut pong_deadline = Instant::now();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                return DropReason::Shutdown;
            }
            _ = heartbeat.tick() => {
                let ping = match serde_json::to_string(&ClientMessage::Ping) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode heartbeat: {}", e);
                        continue;
                    }
                };
                if let Err(e) = ws_stream.send(Message::Text(ping.into())).await {
                    warn!("Failed to send heartbeat: {}", e);
                    return DropReason::Dropped;
                }
                if !awaiting_pong {
                    awaiting_pong = true;
                    pong_deadline = Instant::now() + options.heartbeat_timeout;
                }
            }
            _ = tokio::time::sleep_until(pong_deadline), if awaiting_pong => {
                // Do not wait for a transport-level close event.
                return DropReason::Stale;
            }
            Some(message) = outbound_rx.recv() => {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to encode client message: {}", e);
                        continue;
                    }
                };
                if let Err(e) = ws_stream.send(Message::Text(text.into())).await {
                    warn!("Failed to send client message: {}", e);
                    return DropReason::Dropped;
                }
            }
            inbound = ws_stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => match Envelope::decode(text.as_str()) {
                    Ok(Envelope::Pong { .. }) => {
                        awaiting_pong = false;
                        state_tx.send_modify(|state| state.last_heartbeat_at = Some(Utc::now()));
                        debug!("Heartbeat acknowledged");
                    }
                    Ok(Envelope::Ping { .. }) => {
                        // The service never probes clients today; count it
                        // as liveness and move on.
                        state_tx.send_modify(|state| state.last_heartbeat_at = Some(Utc::now()));
                        debug!("Server ping received");
                    }
                    Ok(envelope) => {
                        let _ = events_tx.send(TransportEvent::Frame(envelope));
                    }
                    Err(e) => {
                        warn!("Dropping undecodable frame: {}", e);
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    return DropReason::Dropped;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Push channel error: {}", e);
                    return DropReason::Dropped;
                }
            }
        }
    }
}

fn set_state(state_tx: &watch::Sender<ChannelState>, status: ChannelStatus, attempt: u32) {
    state_tx.send_modify(|state| {
        state.status = status;
        state.attempt = attempt;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_stream_url_swaps_scheme() {
        let url = build_stream_url(
            "http://localhost:8000",
            "/exam-sessions/s1/kubespray/deploy/logs/ws",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:8000/exam-sessions/s1/kubespray/deploy/logs/ws"
        );

        let url = build_stream_url("https://lab.example.com", "/x/logs/ws").unwrap();
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn test_build_stream_url_rejects_other_schemes() {
        let err = build_stream_url("ftp://lab.example.com", "/x").unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
    }
}
