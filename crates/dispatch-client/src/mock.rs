//! Scripted transport for protocol tests: canned responses, no network.

use crate::{ClientError, DispatchTransport};
use dispatch_types::{
    DispatchRequest, DispatchResponse, ExitStatus, JobMonitor, JobStatus, QueryStatus,
};
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Answers each request with the next scripted response and records what
/// was sent.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<DispatchResponse>>,
    sent: Mutex<Vec<DispatchRequest>>,
}

fn job_status(q: QueryStatus) -> JobStatus {
    match q {
        QueryStatus::New | QueryStatus::Submitted => JobStatus::Submitted,
        QueryStatus::Progress => JobStatus::Progress,
        QueryStatus::Ready => JobStatus::Ready,
        QueryStatus::Done => JobStatus::Done,
        QueryStatus::Failed => JobStatus::Failed,
    }
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = DispatchResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// One response per status, all for job `J` in session `S`.
    pub fn from_statuses(statuses: &[QueryStatus]) -> Self {
        Self::new(statuses.iter().map(|&q| {
            let status = job_status(q);
            DispatchResponse {
                query_status: q,
                session_id: "S".to_string(),
                job_monitor: JobMonitor::new("J", "S", status),
                exit_status: ExitStatus {
                    status: i32::from(status == JobStatus::Failed),
                    message: String::new(),
                    job_status: status,
                },
            }
        }))
    }

    pub async fn sent(&self) -> Vec<DispatchRequest> {
        self.sent.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl DispatchTransport for ScriptedTransport {
    async fn send(&self, req: &DispatchRequest) -> Result<DispatchResponse, ClientError> {
        self.sent.lock().await.push(req.clone());
        self.script
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| ClientError::Http("script exhausted".to_string()))
    }
}
