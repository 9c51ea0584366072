//! Callback URL handed to workers for pushing progress.

use dispatch_types::PROGRESS_MARKER;

pub const DEFAULT_CALLBACK_HANDLE: &str = "call_back";

/// Address of the dispatcher's callback route, as seen from workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEndpoint {
    pub server_url: String,
    pub server_port: u16,
    pub callback_handle: String,
}

impl CallbackEndpoint {
    pub fn new(server_url: impl Into<String>, server_port: u16) -> Self {
        Self {
            server_url: server_url.into(),
            server_port,
            callback_handle: DEFAULT_CALLBACK_HANDLE.to_string(),
        }
    }

    pub fn with_handle(mut self, callback_handle: impl Into<String>) -> Self {
        self.callback_handle = callback_handle.into();
        self
    }

    /// `http://<server>:<port>/<handle>?session_id=..&job_id=..&work_dir=..&file_name=..&instrument_name=..&progressing`
    pub fn url(
        &self,
        session_id: &str,
        job_id: &str,
        work_dir: &str,
        file_name: &str,
        instrument_name: &str,
    ) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("session_id", session_id)
            .append_pair("job_id", job_id)
            .append_pair("work_dir", work_dir)
            .append_pair("file_name", file_name)
            .append_pair("instrument_name", instrument_name)
            .append_key_only(PROGRESS_MARKER)
            .finish();
        format!(
            "http://{}:{}/{}?{}",
            self.server_url, self.server_port, self.callback_handle, query
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_carries_identifiers_and_trailing_marker() {
        let ep = CallbackEndpoint::new("localhost", 8001);
        let url = ep.url(
            "S1",
            "J1",
            "scratch_sid_S1_jid_J1",
            "job_monitor.json",
            "isgri",
        );
        assert_eq!(
            url,
            "http://localhost:8001/call_back?session_id=S1&job_id=J1&work_dir=scratch_sid_S1_jid_J1&file_name=job_monitor.json&instrument_name=isgri&progressing"
        );
    }

    #[test]
    fn values_are_percent_encoded() {
        let ep = CallbackEndpoint::new("10.0.0.5", 80).with_handle("hook");
        let url = ep.url("a b", "J&1", "d/x", "f.json", "empty-semi-async");
        assert!(url.starts_with("http://10.0.0.5:80/hook?"));
        assert!(url.contains("session_id=a+b&"));
        assert!(url.contains("job_id=J%261&"));
        assert!(url.contains("work_dir=d%2Fx&"));
        assert!(url.contains("instrument_name=empty-semi-async&"));
    }

    #[test]
    fn query_decodes_back_to_the_original_values() {
        let ep = CallbackEndpoint::new("localhost", 8000);
        let url = ep.url("a b+c", "J&1=2", "d/x", "f%.json", "isgri");
        let (_, query) = url.split_once('?').unwrap();
        let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("session_id".to_string(), "a b+c".to_string()),
                ("job_id".to_string(), "J&1=2".to_string()),
                ("work_dir".to_string(), "d/x".to_string()),
                ("file_name".to_string(), "f%.json".to_string()),
                ("instrument_name".to_string(), "isgri".to_string()),
                ("progressing".to_string(), String::new()),
            ]
        );
    }
}
