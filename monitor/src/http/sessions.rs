//! Exam session and deployment API client

use serde::{Deserialize, Serialize};

use crate::errors::MonitorError;
use crate::http::client::HttpClient;
use crate::models::job::{JobPhase, PhaseReport};

/// VM node in a session cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmNode {
    pub name: String,

    pub ip: String,

    /// Role: master or worker
    pub role: String,
}

/// SSH access parameters for cluster nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    #[serde(default = "default_ssh_user")]
    pub user: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

fn default_ssh_user() -> String {
    "root".to_string()
}

fn default_ssh_port() -> u16 {
    22
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: default_ssh_user(),
            port: default_ssh_port(),
        }
    }
}

/// Node layout for a session cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmClusterConfig {
    pub name: String,

    pub nodes: Vec<VmNode>,

    #[serde(default)]
    pub ssh_config: SshConfig,
}

/// Registered exam session
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    /// Session identifier assigned by the service
    #[serde(alias = "session_id")]
    pub id: String,

    #[serde(default)]
    pub status: Option<String>,
}

/// Acknowledgement of a generated job specification
#[derive(Debug, Clone, Deserialize)]
pub struct SpecAck {
    pub session_id: String,

    pub inventory_path: String,

    #[serde(default)]
    pub generated_files: Vec<String>,

    #[serde(default)]
    pub generated_at: Option<String>,
}

/// Response of the deploy start call
#[derive(Debug, Clone, Deserialize)]
pub struct StartJobResponse {
    pub session_id: String,

    pub status: JobPhase,

    #[serde(default)]
    pub playbook: Option<String>,

    /// Path of the push log channel endpoint for this job
    pub log_stream_url: String,

    #[serde(default)]
    pub started_at: Option<String>,
}

impl HttpClient {
    /// Register a new exam session
    pub async fn register_session(
        &self,
        question_set_id: &str,
        vm_config_id: &str,
    ) -> Result<SessionInfo, MonitorError> {
        let body = serde_json::json!({
            "question_set_id": question_set_id,
            "vm_config_id": vm_config_id,
        });
        self.post("/exam-sessions", &body).await
    }

    /// Generate the provisioning job specification for a session
    pub async fn generate_job_spec(
        &self,
        session_id: &str,
        vm_config: &VmClusterConfig,
        question_set_id: &str,
    ) -> Result<SpecAck, MonitorError> {
        let path = format!("/exam-sessions/{}/kubespray/inventory", session_id);
        let body = serde_json::json!({
            "session_id": session_id,
            "vm_config": vm_config,
            "question_set_id": question_set_id,
        });
        self.post(&path, &body).await
    }

    /// Start the provisioning job for a session
    pub async fn start_job(
        &self,
        session_id: &str,
        playbook: &str,
    ) -> Result<StartJobResponse, MonitorError> {
        let path = format!("/exam-sessions/{}/kubespray/deploy", session_id);
        let body = serde_json::json!({ "playbook": playbook });
        self.post(&path, &body).await
    }

    /// Query the current phase of a session's provisioning job
    pub async fn query_phase(&self, session_id: &str) -> Result<PhaseReport, MonitorError> {
        let path = format!("/exam-sessions/{}/kubespray/deploy/status", session_id);
        self.get(&path).await
    }
}
