//! Status of a job fanned out over several workers, each with its own
//! status file in the shared scratch directory.

use crate::record::{read_monitor, JobRecord};
use dispatch_types::{JobMonitor, JobStatus};

const WORKER_FILE_STEM: &str = "job_monitor";
const WORKER_FILE_EXT: &str = ".json";

/// `job_monitor*.json`, the dispatcher's own file included.
pub fn is_worker_file(file_name: &str) -> bool {
    file_name.starts_with(WORKER_FILE_STEM) && file_name.ends_with(WORKER_FILE_EXT)
}

/// Reduce worker status files to one monitor.
///
/// `entries` holds one item per file in enumeration order; `None` marks a
/// file that could not be decoded. A failed worker wins over a finished one,
/// which wins over one still reporting progress. Without any of those
/// signals the strongest status observed is kept, and with no files at all
/// the previous status stands. Every report found is collected into
/// `full_report_dict_list`.
pub fn aggregate<I>(previous: &JobMonitor, entries: I) -> JobMonitor
where
    I: IntoIterator<Item = Option<JobMonitor>>,
{
    let mut any_done = false;
    let mut any_failed = false;
    let mut any_progressing = false;
    let mut strongest: Option<JobStatus> = None;
    let mut reports = Vec::new();

    for entry in entries {
        let status = match entry {
            Some(monitor) => {
                match monitor.status {
                    JobStatus::Done => any_done = true,
                    JobStatus::Failed => any_failed = true,
                    _ => {}
                }
                if monitor.is_progressing() {
                    any_progressing = true;
                }
                let status = monitor.status;
                if let Some(report) = monitor.full_report_dict {
                    reports.push(report);
                }
                status
            }
            None => JobStatus::Unaccessible,
        };
        strongest = strongest.max(Some(status));
    }

    let mut status = strongest.unwrap_or(previous.status);
    if any_progressing {
        status = JobStatus::Progress;
    }
    if any_done {
        status = JobStatus::Done;
    }
    if any_failed {
        status = JobStatus::Failed;
    }

    JobMonitor {
        status,
        full_report_dict_list: Some(reports),
        ..previous.clone()
    }
}

/// Job record whose monitor is recomputed from every worker file on refresh.
pub struct MultiWorkerJob {
    record: JobRecord,
}

impl MultiWorkerJob {
    pub fn new(record: JobRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &JobRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut JobRecord {
        &mut self.record
    }

    /// Store keys of the worker status files, sorted.
    pub async fn worker_files(&self) -> Result<Vec<String>, dispatch_types::StateStoreError> {
        let prefix = format!("{}/", self.record.work_dir().name());
        let keys = self.record.store().list(&prefix).await?;
        Ok(keys
            .into_iter()
            .filter(|k| {
                let name = &k[prefix.len()..];
                !name.contains('/') && is_worker_file(name)
            })
            .collect())
    }

    /// Re-scan all worker files. Never fails; a file that cannot be read
    /// counts as `unaccessible` and the scan goes on.
    pub async fn refresh(&mut self) -> &JobMonitor {
        let keys = match self.worker_files().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(job_id = %self.record.job_id(), error = %e, "cannot list worker files");
                self.record.set_unaccessible();
                return self.record.monitor();
            }
        };

        let mut entries = Vec::with_capacity(keys.len());
        for key in &keys {
            match read_monitor(self.record.store(), key).await {
                Ok(monitor) => {
                    tracing::trace!(file = %key, status = %monitor.status, "worker state");
                    entries.push(Some(monitor));
                }
                Err(e) => {
                    tracing::debug!(file = %key, error = %e, "worker state unreadable");
                    entries.push(None);
                }
            }
        }

        let merged = aggregate(self.record.monitor(), entries);
        tracing::debug!(
            job_id = %self.record.job_id(),
            workers = keys.len(),
            status = %merged.status,
            "aggregated job state"
        );
        self.record.replace_monitor(merged);
        self.record.monitor()
    }
}
