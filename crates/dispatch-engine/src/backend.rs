//! Built-in analysis backends and the instrument registry.

use async_trait::async_trait;
use chrono::Utc;
use dispatch_types::{AnalysisBackend, BackendContext, BackendError, BackendOutcome};
use std::collections::HashMap;
use std::sync::Arc;

/// Completes synchronously with an empty product set.
#[derive(Debug, Clone, Default)]
pub struct InstantBackend;

#[async_trait]
impl AnalysisBackend for InstantBackend {
    async fn run(&self, ctx: &BackendContext) -> Result<BackendOutcome, BackendError> {
        tracing::debug!(instrument = %ctx.instrument, job_id = %ctx.job_id, "instant analysis");
        Ok(BackendOutcome::Done(serde_json::json!({
            "instrument": ctx.instrument,
            "products": [],
            "completed_at": Utc::now().to_rfc3339(),
        })))
    }
}

/// Accepts the job and leaves completion to workers reporting through the
/// callback URL.
#[derive(Debug, Clone, Default)]
pub struct DeferredBackend;

#[async_trait]
impl AnalysisBackend for DeferredBackend {
    async fn run(&self, ctx: &BackendContext) -> Result<BackendOutcome, BackendError> {
        tracing::info!(
            instrument = %ctx.instrument,
            job_id = %ctx.job_id,
            session_id = %ctx.session_id,
            callback = %ctx.callback_url,
            "job handed to workers"
        );
        Ok(BackendOutcome::Submitted)
    }
}

/// Instrument name to backend.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn AnalysisBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `empty` completes at once; `empty-semi-async` and the given
    /// multi-worker instruments wait for callbacks.
    pub fn with_builtin<I, S>(multi_worker: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut reg = Self::new()
            .register("empty", Arc::new(InstantBackend))
            .register("empty-semi-async", Arc::new(DeferredBackend));
        for name in multi_worker {
            reg = reg.register(name, Arc::new(DeferredBackend));
        }
        reg
    }

    pub fn register(mut self, instrument: impl Into<String>, backend: Arc<dyn AnalysisBackend>) -> Self {
        self.backends.insert(instrument.into(), backend);
        self
    }

    pub fn get(&self, instrument: &str) -> Option<Arc<dyn AnalysisBackend>> {
        self.backends.get(instrument).cloned()
    }

    /// Registered instrument names, sorted.
    pub fn instruments(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
