//! Provisioning log models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity assigned to a log line by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A classified log line from the provisioning run.
///
/// Ids are assigned per push-channel instance, unique and strictly
/// increasing in arrival order. A reconnect may skip lines produced while
/// disconnected, so the sequence is not a complete history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,

    /// Arrival time on this client
    pub timestamp: DateTime<Utc>,

    pub severity: Severity,

    /// Trimmed message text
    pub message: String,

    /// The line exactly as it arrived on the wire
    pub raw_source: String,
}
