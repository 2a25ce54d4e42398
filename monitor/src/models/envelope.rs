//! Wire envelopes for the push log channel
//!
//! Every frame on the deployment log stream is a UTF-8 JSON envelope
//! `{type, session_id, data, timestamp}`. The `type` tag is matched
//! exhaustively at the decode boundary; an unknown tag is a decode error
//! that the transport drops and logs.

use serde::{Deserialize, Serialize};

use crate::errors::MonitorError;
use crate::models::job::PhaseReport;

/// Inbound message envelope, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Stream acknowledgement sent by the service right after accept
    Connected {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },

    /// A raw provisioning log line
    Log {
        #[serde(default)]
        session_id: Option<String>,
        data: LogData,
    },

    /// Point-in-time job status
    Status {
        #[serde(default)]
        session_id: Option<String>,
        data: PhaseReport,
    },

    /// Remote job failure report. The service emits this in two shapes:
    /// a relayed `{data: {error, failed_at}}` payload, or a bare `message`.
    Error {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        data: Option<ErrorData>,
        #[serde(default)]
        message: Option<String>,
    },

    Ping {
        #[serde(default)]
        session_id: Option<String>,
    },

    /// Heartbeat acknowledgement; consumed by the transport
    Pong {
        #[serde(default)]
        session_id: Option<String>,
    },

    /// Control command echo; the service never sends these today
    Command {
        #[serde(default)]
        command: Option<String>,
    },

    /// Acknowledgement of a client `command` message
    CommandReceived {
        #[serde(default)]
        command: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl Envelope {
    /// Decode one UTF-8 text frame
    pub fn decode(text: &str) -> Result<Self, MonitorError> {
        serde_json::from_str(text).map_err(|e| MonitorError::Protocol(e.to_string()))
    }
}

/// Payload of a `log` envelope
#[derive(Debug, Clone, Deserialize)]
pub struct LogData {
    /// Line timestamp as stamped by the service
    #[serde(default)]
    pub timestamp: Option<String>,

    pub message: String,
}

/// Failure payload of an `error` envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub failed_at: Option<String>,
}

/// Outbound client messages on the push channel
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Heartbeat probe; the service answers with `pong`
    Ping,

    /// Ask the service to push a `status` frame with the current phase
    GetStatus,

    /// Deployment control command; acked with `command_received`
    Command { command: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobPhase;

    #[test]
    fn test_decode_log_frame() {
        let frame = r#"{"type":"log","session_id":"s1","data":{"timestamp":"2025-01-01T00:00:01","message":"TASK [kubernetes/preinstall]"},"timestamp":"2025-01-01T00:00:01"}"#;
        match Envelope::decode(frame).unwrap() {
            Envelope::Log { session_id, data } => {
                assert_eq!(session_id.as_deref(), Some("s1"));
                assert_eq!(data.message, "TASK [kubernetes/preinstall]");
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[test]
    fn test_decode_status_frame() {
        let frame = r#"{"type":"status","session_id":"s1","data":{"session_id":"s1","status":"started","exit_code":null}}"#;
        match Envelope::decode(frame).unwrap() {
            Envelope::Status { data, .. } => assert_eq!(data.phase, JobPhase::Running),
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[test]
    fn test_decode_terminal_status_frame() {
        let frame = r#"{"type":"status","data":{"status":"completed","exit_code":0,"completed_at":"2025-01-01T00:30:00"}}"#;
        match Envelope::decode(frame).unwrap() {
            Envelope::Status { data, .. } => {
                assert_eq!(data.phase, JobPhase::Completed);
                assert_eq!(data.exit_code, Some(0));
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[test]
    fn test_decode_error_frame_shapes() {
        let relayed = r#"{"type":"error","session_id":"s1","data":{"error":"ansible died","failed_at":"2025-01-01T00:05:00"}}"#;
        match Envelope::decode(relayed).unwrap() {
            Envelope::Error { data, message, .. } => {
                assert_eq!(data.unwrap().error.as_deref(), Some("ansible died"));
                assert!(message.is_none());
            }
            other => panic!("unexpected envelope: {:?}", other),
        }

        let bare = r#"{"type":"error","session_id":"s1","message":"status record missing"}"#;
        match Envelope::decode(bare).unwrap() {
            Envelope::Error { data, message, .. } => {
                assert!(data.is_none());
                assert_eq!(message.as_deref(), Some("status record missing"));
            }
            other => panic!("unexpected envelope: {:?}", other),
        }
    }

    #[test]
    fn test_decode_command_ack() {
        let frame = r#"{"type":"command_received","session_id":"s1","command":"pause","message":"ack"}"#;
        assert!(matches!(
            Envelope::decode(frame).unwrap(),
            Envelope::CommandReceived { .. }
        ));
    }

    #[test]
    fn test_unknown_type_is_a_protocol_error() {
        let err = Envelope::decode(r#"{"type":"telemetry","data":{}}"#).unwrap_err();
        assert!(matches!(err, MonitorError::Protocol(_)));
    }

    #[test]
    fn test_client_messages_serialize_to_wire_tags() {
        assert_eq!(
            serde_json::to_string(&ClientMessage::Ping).unwrap(),
            r#"{"type":"ping"}"#
        );
        assert_eq!(
            serde_json::to_string(&ClientMessage::GetStatus).unwrap(),
            r#"{"type":"get_status"}"#
        );
        assert_eq!(
            serde_json::to_string(&ClientMessage::Command {
                command: "pause".to_string()
            })
            .unwrap(),
            r#"{"type":"command","command":"pause"}"#
        );
    }
}
