//! Request and response DTOs for the dispatch endpoint and worker callbacks.

use crate::{JobMonitor, JobStatus, QueryStatus};
use serde::{Deserialize, Serialize};

/// One poll of the dispatch endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub instrument: String,
    pub query_status: QueryStatus,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Identity results are scoped to, when they must not be shared between users.
    #[serde(default)]
    pub user: Option<String>,
    /// Full request-parameter mapping; the restricted subset determines `job_id`.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl DispatchRequest {
    /// Opening request of a polling sequence.
    pub fn new(
        instrument: impl Into<String>,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            query_status: QueryStatus::New,
            job_id: None,
            session_id: None,
            user: None,
            params,
        }
    }

    /// Follow-up request echoing identifiers from `previous`.
    pub fn follow_up(&self, previous: &DispatchResponse, query_status: QueryStatus) -> Self {
        Self {
            query_status,
            job_id: previous.job_monitor.job_id.clone(),
            session_id: Some(previous.session_id.clone()),
            ..self.clone()
        }
    }
}

/// Outcome summary attached to every dispatch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitStatus {
    /// 0 on success, 1 when the job failed.
    pub status: i32,
    pub message: String,
    pub job_status: JobStatus,
}

/// Answer to one poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub query_status: QueryStatus,
    pub session_id: String,
    pub job_monitor: JobMonitor,
    pub exit_status: ExitStatus,
}

/// Progress pushed by a worker through the callback URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackReport {
    pub session_id: String,
    pub job_id: String,
    pub instrument_name: String,
    /// Requested status; absent means `progress`.
    #[serde(default)]
    pub action: Option<String>,
    /// Every query parameter of the callback, stored verbatim as the worker's report.
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Error body returned by the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: i32,
    pub message: String,
}
