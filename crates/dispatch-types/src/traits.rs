//! Traits for the shared job-state store and analysis backends.

use async_trait::async_trait;

/// Key-value view of the shared scratch area.
///
/// Keys are `/`-separated relative paths such as
/// `scratch_sid_S_jid_J/job_monitor.json`. Writes replace the whole value;
/// there is no locking, so readers must tolerate partially written values.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read one value; `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StateStoreError>;

    /// Create or overwrite one value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StateStoreError>;

    /// All keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StateStoreError>;

    /// Remove every key starting with `prefix`; returns how many were removed.
    async fn remove_prefix(&self, prefix: &str) -> Result<usize, StateStoreError>;
}

/// What a backend needs to start or re-evaluate one job.
#[derive(Debug, Clone)]
pub struct BackendContext {
    pub instrument: String,
    pub job_id: String,
    pub session_id: String,
    /// Scratch directory key owning the job's state.
    pub work_dir: String,
    /// Where workers report progress.
    pub callback_url: String,
    pub params: serde_json::Map<String, serde_json::Value>,
}

/// Immediate result of handing a job to a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOutcome {
    /// Finished synchronously; the value becomes the job's full report.
    Done(serde_json::Value),
    /// Accepted; workers will report through the callback URL.
    Submitted,
    Failed(String),
}

/// Executes (or fans out) the actual analysis for one instrument.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn run(&self, ctx: &BackendContext) -> Result<BackendOutcome, BackendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("state store io error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid state store key: {0}")]
    InvalidKey(String),
    #[error("state store error: {0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend error: {0}")]
    Other(String),
    #[error("backend rejected request: {0}")]
    Rejected(String),
}
