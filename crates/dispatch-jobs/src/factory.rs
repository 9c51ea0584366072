//! Pick the status-record kind for an instrument, once, at dispatch time.

use crate::aggregate::MultiWorkerJob;
use crate::callback::CallbackEndpoint;
use crate::error::Result;
use crate::record::{JobRecord, DEFAULT_STATUS_FILE};
use crate::scratch::ScratchDir;
use dispatch_types::{InvalidStatus, JobMonitor, JobStatus, StateStore};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Instruments whose jobs are split over several worker processes.
pub const DEFAULT_MULTI_WORKER_INSTRUMENTS: &[&str] = &["isgri", "jemx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Single,
    MultiWorker,
}

/// Spaces and path separators become underscores so the file stays a
/// direct child of the scratch directory.
fn file_name_part(raw: &str) -> String {
    raw.replace([' ', '/', '\\'], "_")
}

/// Status file of one worker: `job_monitor_<node_id>_<message>_.json`.
/// `None` when the parameters identify no worker.
pub fn worker_file_name(params: &Map<String, Value>) -> Option<String> {
    let mut flag = String::new();
    if let Some(node) = params.get("node_id").filter(|v| !v.is_null()) {
        let node = match node {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        flag.push_str(&format!("_{}", file_name_part(&node)));
    }
    if let Some(message) = params.get("message").and_then(Value::as_str) {
        flag.push_str(&format!("_{}", file_name_part(message)));
    }
    if flag.is_empty() {
        None
    } else {
        Some(format!("job_monitor{}_.json", flag))
    }
}

/// A job status record, either single-file or aggregated over workers.
pub enum Job {
    Single(JobRecord),
    MultiWorker(MultiWorkerJob),
}

impl Job {
    pub fn kind(&self) -> BackendKind {
        match self {
            Job::Single(_) => BackendKind::Single,
            Job::MultiWorker(_) => BackendKind::MultiWorker,
        }
    }

    pub fn record(&self) -> &JobRecord {
        match self {
            Job::Single(r) => r,
            Job::MultiWorker(m) => m.record(),
        }
    }

    pub fn record_mut(&mut self) -> &mut JobRecord {
        match self {
            Job::Single(r) => r,
            Job::MultiWorker(m) => m.record_mut(),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.record().status()
    }

    pub fn monitor(&self) -> &JobMonitor {
        self.record().monitor()
    }

    pub fn set_status(&mut self, status: JobStatus) {
        self.record_mut().set_status(status);
    }

    pub fn try_set_status(&mut self, status: &str) -> std::result::Result<(), InvalidStatus> {
        self.record_mut().try_set_status(status)
    }

    pub async fn refresh(&mut self) -> &JobMonitor {
        match self {
            Job::Single(r) => r.refresh().await,
            Job::MultiWorker(m) => m.refresh().await,
        }
    }

    pub async fn persist(
        &mut self,
        status: Option<JobStatus>,
        full_report: Option<Value>,
    ) -> Result<()> {
        self.record_mut().persist(status, full_report).await
    }

    pub fn callback_url(&self) -> String {
        self.record().callback_url()
    }
}

/// Builds [`Job`]s for dispatched requests.
#[derive(Clone)]
pub struct JobFactory {
    store: Arc<dyn StateStore>,
    endpoint: CallbackEndpoint,
    multi_worker: Vec<String>,
}

impl JobFactory {
    pub fn new(store: Arc<dyn StateStore>, endpoint: CallbackEndpoint) -> Self {
        Self {
            store,
            endpoint,
            multi_worker: DEFAULT_MULTI_WORKER_INSTRUMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_multi_worker_instruments<I, S>(mut self, instruments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.multi_worker = instruments.into_iter().map(Into::into).collect();
        self
    }

    pub fn endpoint(&self) -> &CallbackEndpoint {
        &self.endpoint
    }

    pub fn kind_for(&self, instrument: &str) -> BackendKind {
        if self.multi_worker.iter().any(|i| i == instrument) {
            BackendKind::MultiWorker
        } else {
            BackendKind::Single
        }
    }

    /// Record for `instrument` in `work_dir`. For multi-worker instruments the
    /// status file is named after the worker identified in `params`, so
    /// concurrent workers never share a file.
    pub fn build(&self, instrument: &str, work_dir: ScratchDir, params: &Map<String, Value>) -> Job {
        let record = JobRecord::new(
            self.store.clone(),
            instrument,
            work_dir,
            self.endpoint.clone(),
        );
        match self.kind_for(instrument) {
            BackendKind::Single => Job::Single(record),
            BackendKind::MultiWorker => {
                let file_name =
                    worker_file_name(params).unwrap_or_else(|| DEFAULT_STATUS_FILE.to_string());
                Job::MultiWorker(MultiWorkerJob::new(record.with_file_name(file_name)))
            }
        }
    }
}
