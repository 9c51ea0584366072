//! The `job_monitor` document persisted in status files.

use crate::JobStatus;
use serde::{Deserialize, Serialize};

/// Report key a worker sets while it is still working.
pub const PROGRESS_MARKER: &str = "progressing";

/// Contents of one status file (`job_monitor*.json`).
///
/// Field names are the compatibility surface for external tooling; keys this
/// type does not know are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMonitor {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_report_dict: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_report_dict_list: Option<Vec<serde_json::Value>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl JobMonitor {
    pub fn new(job_id: &str, session_id: &str, status: JobStatus) -> Self {
        Self {
            job_id: Some(job_id.to_string()),
            session_id: Some(session_id.to_string()),
            status,
            ..Self::default()
        }
    }

    /// True when the attached report carries the worker progress marker.
    pub fn is_progressing(&self) -> bool {
        self.full_report_dict
            .as_ref()
            .and_then(|r| r.as_object())
            .is_some_and(|r| r.contains_key(PROGRESS_MARKER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_minimal_document_and_keeps_extra_keys() {
        let doc = json!({
            "job_id": "A1",
            "session_id": "S1",
            "status": "submitted",
            "node_id": "n3"
        });
        let m: JobMonitor = serde_json::from_value(doc).unwrap();
        assert_eq!(m.status, JobStatus::Submitted);
        assert_eq!(m.extra.get("node_id"), Some(&json!("n3")));
        let back = serde_json::to_value(&m).unwrap();
        assert_eq!(back["node_id"], "n3");
        assert!(back.get("full_report_dict").is_none());
    }

    #[test]
    fn status_outside_vocabulary_fails_to_decode() {
        let doc = json!({ "job_id": "A1", "session_id": "S1", "status": "finished" });
        assert!(serde_json::from_value::<JobMonitor>(doc).is_err());
    }

    #[test]
    fn progress_marker_is_detected_in_report() {
        let mut m = JobMonitor::new("J", "S", JobStatus::Submitted);
        assert!(!m.is_progressing());
        m.full_report_dict = Some(json!({ "progressing": "", "action": "progress" }));
        assert!(m.is_progressing());
    }
}
