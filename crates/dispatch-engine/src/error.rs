use dispatch_jobs::JobError;
use dispatch_types::InvalidStatus;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),
    #[error("missing request parameter: {0}")]
    MissingParameter(&'static str),
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),
    #[error(transparent)]
    Job(#[from] JobError),
}

impl DispatchError {
    /// The request names a job whose scratch state does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DispatchError::Job(JobError::MissingScratchState { .. }))
    }

    /// The request itself is malformed.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            DispatchError::UnknownInstrument(_)
                | DispatchError::MissingParameter(_)
                | DispatchError::InvalidStatus(_)
                | DispatchError::Job(JobError::InvalidStatus(_))
                | DispatchError::Job(JobError::InvalidIdentifier(_))
        )
    }
}
