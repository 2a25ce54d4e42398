//! Settings file management

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::MonitorError;
use crate::logs::LogLevel;
use crate::monitor::orchestrator::MonitorOptions;
use crate::transport::backoff::ReconnectPolicy;
use crate::transport::reconnect::TransportOptions;
use crate::workers::poller;

/// Monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Backend configuration
    #[serde(default)]
    pub backend: BackendSettings,

    /// Push channel transport tuning
    #[serde(default)]
    pub transport: TransportSettings,

    /// Status poller tuning
    #[serde(default)]
    pub poller: PollerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            backend: BackendSettings::default(),
            transport: TransportSettings::default(),
            poller: PollerSettings::default(),
        }
    }
}

impl Settings {
    /// Read settings from a JSON file
    pub async fn load(path: &Path) -> Result<Self, MonitorError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Monitor tuning derived from these settings
    pub fn monitor_options(&self) -> MonitorOptions {
        MonitorOptions {
            transport: self.transport.to_options(),
            poller: self.poller.to_options(),
        }
    }
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL for the backend API
    #[serde(default = "default_backend_url")]
    pub base_url: String,
}

fn default_backend_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
        }
    }
}

/// Push channel transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Delay before the first reconnect attempt, in seconds
    #[serde(default = "default_reconnect_initial_delay")]
    pub reconnect_initial_delay_secs: u64,

    /// Reconnect delay cap, in seconds
    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_secs: u64,

    /// Consecutive connect failures tolerated before giving up
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    /// Heartbeat send interval, in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Heartbeat acknowledgement timeout, in seconds
    #[serde(default = "default_heartbeat_timeout")]
    pub heartbeat_timeout_secs: u64,
}

fn default_reconnect_initial_delay() -> u64 {
    1
}

fn default_reconnect_max_delay() -> u64 {
    30
}

fn default_reconnect_max_attempts() -> u32 {
    10
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_heartbeat_timeout() -> u64 {
    10
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            reconnect_initial_delay_secs: default_reconnect_initial_delay(),
            reconnect_max_delay_secs: default_reconnect_max_delay(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            heartbeat_timeout_secs: default_heartbeat_timeout(),
        }
    }
}

impl TransportSettings {
    pub fn to_options(&self) -> TransportOptions {
        TransportOptions {
            backoff: ReconnectPolicy {
                initial_delay: Duration::from_secs(self.reconnect_initial_delay_secs),
                max_delay: Duration::from_secs(self.reconnect_max_delay_secs),
            },
            max_attempts: self.reconnect_max_attempts,
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            heartbeat_timeout: Duration::from_secs(self.heartbeat_timeout_secs),
        }
    }
}

/// Status poller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerSettings {
    /// Polling cadence in seconds
    #[serde(default = "default_poll_cadence")]
    pub cadence_secs: u64,
}

fn default_poll_cadence() -> u64 {
    10
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            cadence_secs: default_poll_cadence(),
        }
    }
}

impl PollerSettings {
    pub fn to_options(&self) -> poller::Options {
        poller::Options {
            cadence: Duration::from_secs(self.cadence_secs),
        }
    }
}
