use dispatch_types::{InvalidStatus, StateStoreError};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),

    /// Status file missing, unreadable or undecodable. `refresh` absorbs this;
    /// it only escapes through the lower-level loaders.
    #[error("job state at '{key}' is unreadable: {reason}")]
    UnreadableJobState { key: String, reason: String },

    #[error("no scratch directory for session '{session_id}' and job '{job_id}'")]
    MissingScratchState { session_id: String, job_id: String },

    #[error("invalid identifier '{0}': must be non-empty and free of path separators")]
    InvalidIdentifier(String),

    #[error("invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("failed to encode job state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StateStoreError),
}

pub type Result<T> = std::result::Result<T, JobError>;
