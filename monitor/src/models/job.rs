//! Deployment job models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of a provisioning job.
///
/// The provisioning service additionally reports `"started"` between
/// accepting a job and its first output line; that value parses as
/// `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Pending,

    #[serde(alias = "started")]
    Running,

    Completed,

    Failed,
}

impl JobPhase {
    /// Whether this phase is terminal (sticky, never mutated again)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Failed)
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            JobPhase::Pending => "pending",
            JobPhase::Running => "running",
            JobPhase::Completed => "completed",
            JobPhase::Failed => "failed",
        })
    }
}

/// A provisioning job being monitored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentJob {
    /// Job handle; the provisioning service keys one job per session
    pub id: String,

    /// Exam session this job provisions a cluster for
    pub session_id: String,

    /// Current phase; mutated only by the completion arbiter
    pub phase: JobPhase,

    /// When the launch sequence succeeded
    pub started_at: DateTime<Utc>,

    /// When a terminal phase was observed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Exit code reported by the provisioning run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

/// Point-in-time phase report, from either the status endpoint or a
/// `status` frame on the push channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseReport {
    #[serde(rename = "status")]
    pub phase: JobPhase,

    #[serde(default)]
    pub exit_code: Option<i32>,

    /// Completion timestamp as reported by the service
    #[serde(default)]
    pub completed_at: Option<String>,
}
