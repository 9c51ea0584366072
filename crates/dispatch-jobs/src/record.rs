//! Single-worker job status record backed by one status file.

use crate::callback::CallbackEndpoint;
use crate::error::{JobError, Result};
use crate::scratch::ScratchDir;
use dispatch_types::{InvalidStatus, JobMonitor, JobStatus, StateStore};
use std::sync::Arc;

pub const DEFAULT_STATUS_FILE: &str = "job_monitor.json";

/// Decode one status file. Missing, unreadable and malformed files all map to
/// [`JobError::UnreadableJobState`].
pub(crate) async fn read_monitor(store: &dyn StateStore, key: &str) -> Result<JobMonitor> {
    let bytes = store
        .get(key)
        .await
        .map_err(|e| JobError::UnreadableJobState {
            key: key.to_string(),
            reason: e.to_string(),
        })?
        .ok_or_else(|| JobError::UnreadableJobState {
            key: key.to_string(),
            reason: "missing".to_string(),
        })?;
    serde_json::from_slice(&bytes).map_err(|e| JobError::UnreadableJobState {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Status of a job whose work is done by one worker writing one file.
///
/// In-memory changes (`set_*`) are not visible to anyone else until
/// [`JobRecord::persist`]; [`JobRecord::refresh`] replaces the in-memory
/// monitor with whatever the file holds.
pub struct JobRecord {
    instrument_name: String,
    work_dir: ScratchDir,
    endpoint: CallbackEndpoint,
    file_name: String,
    monitor: JobMonitor,
    store: Arc<dyn StateStore>,
}

impl JobRecord {
    pub fn new(
        store: Arc<dyn StateStore>,
        instrument_name: impl Into<String>,
        work_dir: ScratchDir,
        endpoint: CallbackEndpoint,
    ) -> Self {
        let monitor = JobMonitor::new(
            work_dir.job_id(),
            work_dir.session_id(),
            JobStatus::Unaccessible,
        );
        Self {
            instrument_name: instrument_name.into(),
            work_dir,
            endpoint,
            file_name: DEFAULT_STATUS_FILE.to_string(),
            monitor,
            store,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn instrument_name(&self) -> &str {
        &self.instrument_name
    }

    pub fn work_dir(&self) -> &ScratchDir {
        &self.work_dir
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Store key of the backing status file.
    pub fn file_key(&self) -> String {
        self.work_dir.key(&self.file_name)
    }

    pub fn job_id(&self) -> &str {
        self.work_dir.job_id()
    }

    pub fn session_id(&self) -> &str {
        self.work_dir.session_id()
    }

    pub fn monitor(&self) -> &JobMonitor {
        &self.monitor
    }

    pub fn status(&self) -> JobStatus {
        self.monitor.status
    }

    pub fn set_status(&mut self, status: JobStatus) {
        self.monitor.status = status;
    }

    /// Assign from a raw status string; on error nothing changes.
    pub fn try_set_status(&mut self, status: &str) -> std::result::Result<(), InvalidStatus> {
        let parsed: JobStatus = status.parse()?;
        self.set_status(parsed);
        Ok(())
    }

    pub fn set_progress(&mut self) {
        self.set_status(JobStatus::Progress);
    }

    pub fn set_submitted(&mut self) {
        self.set_status(JobStatus::Submitted);
    }

    pub fn set_done(&mut self) {
        self.set_status(JobStatus::Done);
    }

    pub fn set_failed(&mut self) {
        self.set_status(JobStatus::Failed);
    }

    pub fn set_ready(&mut self) {
        self.set_status(JobStatus::Ready);
    }

    pub fn set_unaccessible(&mut self) {
        self.set_status(JobStatus::Unaccessible);
    }

    pub(crate) fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    pub(crate) fn replace_monitor(&mut self, monitor: JobMonitor) {
        self.monitor = monitor;
    }

    /// Re-read the status file. Never fails: an unreadable file (missing,
    /// half-written by a worker, not JSON) leaves the record `unaccessible`.
    pub async fn refresh(&mut self) -> &JobMonitor {
        let key = self.file_key();
        match read_monitor(self.store.as_ref(), &key).await {
            Ok(monitor) => self.monitor = monitor,
            Err(e) => {
                tracing::debug!(job_id = %self.job_id(), error = %e, "job state unreadable");
                self.set_unaccessible();
            }
        }
        &self.monitor
    }

    /// Overwrite the status file with the current monitor, after optionally
    /// replacing the status and attaching a full report.
    pub async fn persist(
        &mut self,
        status: Option<JobStatus>,
        full_report: Option<serde_json::Value>,
    ) -> Result<()> {
        if let Some(status) = status {
            self.monitor.status = status;
        }
        if let Some(report) = full_report {
            self.monitor.full_report_dict = Some(report);
        }
        let body = serde_json::to_vec(&self.monitor)?;
        self.store.put(&self.file_key(), &body).await?;
        tracing::debug!(
            job_id = %self.job_id(),
            session_id = %self.session_id(),
            status = %self.monitor.status,
            file = %self.file_name,
            "job state written"
        );
        Ok(())
    }

    pub fn callback_url(&self) -> String {
        self.endpoint.url(
            self.session_id(),
            self.job_id(),
            &self.work_dir.name(),
            &self.file_name,
            &self.instrument_name,
        )
    }
}
