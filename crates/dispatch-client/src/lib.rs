//! Client side of the dispatch polling protocol.
//!
//! `new -> {submitted, done} -> ... -> {ready, done, failed}`: open with
//! `new`, then keep echoing the observed status with the returned
//! `job_id`/`session_id` until the dispatcher reports a terminal state.

mod http;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use http::HttpTransport;
#[cfg(any(test, feature = "test-util"))]
pub use mock::ScriptedTransport;

use dispatch_types::{DispatchRequest, DispatchResponse, QueryStatus};
use std::time::Duration;

/// Sends one poll to a dispatcher.
#[async_trait::async_trait]
pub trait DispatchTransport: Send + Sync {
    async fn send(&self, req: &DispatchRequest) -> Result<DispatchResponse, ClientError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("dispatcher request failed: {0}")]
    Http(String),
    #[error("dispatcher returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("cannot decode dispatcher response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Transport(#[from] ClientError),
    #[error("unexpected query status '{0}' after opening request")]
    UnexpectedStatus(QueryStatus),
    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },
    #[error("job still running after {polls} polls")]
    Timeout { polls: u32 },
}

#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Sleep between polls.
    pub interval: Duration,
    /// Echo the observed status this many times, then send `ready` once.
    pub reset_after: u32,
    /// Give up after this many requests in total.
    pub max_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            reset_after: 20,
            max_polls: None,
        }
    }
}

pub struct PollingClient<T> {
    transport: T,
    policy: PollPolicy,
}

fn job_failed(resp: &DispatchResponse) -> PollError {
    PollError::JobFailed {
        job_id: resp.job_monitor.job_id.clone().unwrap_or_default(),
        message: resp.exit_status.message.clone(),
    }
}

impl<T: DispatchTransport> PollingClient<T> {
    pub fn new(transport: T) -> Self {
        Self::with_policy(transport, PollPolicy::default())
    }

    pub fn with_policy(transport: T, policy: PollPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run `req` to completion and return the final response.
    pub async fn run(&self, req: DispatchRequest) -> Result<DispatchResponse, PollError> {
        let req = DispatchRequest {
            query_status: QueryStatus::New,
            ..req
        };
        let mut resp = self.transport.send(&req).await?;
        match resp.query_status {
            QueryStatus::Submitted | QueryStatus::Done => {}
            QueryStatus::Failed => return Err(job_failed(&resp)),
            other => return Err(PollError::UnexpectedStatus(other)),
        }

        let mut polls: u32 = 1;
        let mut tries_till_reset = self.policy.reset_after;
        loop {
            tracing::debug!(
                job_id = resp.job_monitor.job_id.as_deref().unwrap_or(""),
                session_id = %resp.session_id,
                query_status = %resp.query_status,
                status = %resp.job_monitor.status,
                polls,
                "dispatcher answered"
            );
            if resp.query_status.is_complete() {
                return Ok(resp);
            }
            if resp.query_status == QueryStatus::Failed {
                return Err(job_failed(&resp));
            }
            if let Some(max) = self.policy.max_polls {
                if polls >= max {
                    return Err(PollError::Timeout { polls });
                }
            }

            tokio::time::sleep(self.policy.interval).await;
            let next = if tries_till_reset == 0 {
                tries_till_reset = self.policy.reset_after;
                QueryStatus::Ready
            } else {
                tries_till_reset -= 1;
                resp.query_status
            };
            resp = self.transport.send(&req.follow_up(&resp, next)).await?;
            polls += 1;
        }
    }
}
