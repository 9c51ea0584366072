//! Job status vocabulary and client-facing query status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of one job (or one worker of a job).
///
/// The vocabulary is closed: any member may follow any other, but nothing
/// outside it can be assigned. Variants are declared in aggregation order, so
/// the derived `Ord` is the precedence used when reducing many worker states
/// into one (`Failed` is the strongest).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Unaccessible,
    Unknown,
    Ready,
    Submitted,
    Progress,
    Done,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        JobStatus::Unaccessible,
        JobStatus::Unknown,
        JobStatus::Ready,
        JobStatus::Submitted,
        JobStatus::Progress,
        JobStatus::Done,
        JobStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Unaccessible => "unaccessible",
            JobStatus::Unknown => "unknown",
            JobStatus::Ready => "ready",
            JobStatus::Submitted => "submitted",
            JobStatus::Progress => "progress",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }

    /// Done or failed: no further worker updates are expected.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status string outside the job status vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job status '{0}' is not allowed (expected one of: unaccessible, unknown, ready, submitted, progress, done, failed)")]
pub struct InvalidStatus(pub String);

impl FromStr for JobStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| InvalidStatus(s.to_string()))
    }
}

/// Status exchanged between a polling client and the dispatcher.
///
/// A client opens with `New`, then echoes whatever it last observed; `Ready`
/// asks the dispatcher for a fresh evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    New,
    Submitted,
    Progress,
    Ready,
    Done,
    Failed,
}

impl QueryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryStatus::New => "new",
            QueryStatus::Submitted => "submitted",
            QueryStatus::Progress => "progress",
            QueryStatus::Ready => "ready",
            QueryStatus::Done => "done",
            QueryStatus::Failed => "failed",
        }
    }

    /// Polling stops successfully on these.
    pub fn is_complete(self) -> bool {
        matches!(self, QueryStatus::Ready | QueryStatus::Done)
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
