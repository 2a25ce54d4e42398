//! Error types for the deployment monitor

use thiserror::Error;

/// Steps of the launch sequence, used to tag orchestration failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStep {
    RegisterSession,
    GenerateSpec,
    StartJob,
}

impl std::fmt::Display for LaunchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            LaunchStep::RegisterSession => "register session",
            LaunchStep::GenerateSpec => "generate job spec",
            LaunchStep::StartJob => "start job",
        })
    }
}

/// Main error type for the deployment monitor
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("launch step '{step}' failed: {message}")]
    Launch { step: LaunchStep, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}
