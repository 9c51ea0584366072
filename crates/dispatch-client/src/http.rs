//! HTTP transport to a dispatcher's `POST /run_analysis`.

use crate::{ClientError, DispatchTransport};
use dispatch_types::{DispatchRequest, DispatchResponse};

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    /// `base_url` is the dispatcher root, e.g. `http://localhost:8000`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/run_analysis", base_url.trim_end_matches('/')),
        }
    }

    pub fn from_env() -> Self {
        let base = std::env::var("DISPATCHER_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string());
        Self::new(&base)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl DispatchTransport for HttpTransport {
    async fn send(&self, req: &DispatchRequest) -> Result<DispatchResponse, ClientError> {
        let res = self
            .client
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(ClientError::Status {
                code: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_analysis_url() {
        assert_eq!(
            HttpTransport::new("http://dispatcher:8000/").url(),
            "http://dispatcher:8000/run_analysis"
        );
    }
}
