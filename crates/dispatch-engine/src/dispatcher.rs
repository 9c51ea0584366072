//! Server side of the polling protocol.

use crate::backend::BackendRegistry;
use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use dispatch_jobs::identity::job_id_with;
use dispatch_jobs::{Job, JobFactory, Restriction, ScratchDir, ScratchSpaces};
use dispatch_types::{
    AnalysisBackend, BackendContext, BackendOutcome, CallbackReport, DispatchRequest,
    DispatchResponse, ExitStatus, JobStatus, QueryStatus, StateStore,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Answers dispatch polls and worker callbacks against a shared [`StateStore`].
pub struct Dispatcher {
    spaces: ScratchSpaces,
    factory: JobFactory,
    backends: BackendRegistry,
    restriction: Restriction,
}

fn new_session_id() -> String {
    let id = Uuid::new_v4().simple().to_string().to_uppercase();
    id[..16].to_string()
}

fn failure_message(job: &Job) -> String {
    job.monitor()
        .full_report_dict
        .as_ref()
        .and_then(|r| r.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("job failed")
        .to_string()
}

/// Response for the job as currently observed. Only terminal statuses are
/// reported as such; everything else tells the client to keep polling.
fn respond(job: &Job) -> DispatchResponse {
    let status = job.status();
    let (query_status, exit_code, message) = match status {
        JobStatus::Done => (QueryStatus::Done, 0, String::new()),
        JobStatus::Failed => (QueryStatus::Failed, 1, failure_message(job)),
        _ => (QueryStatus::Submitted, 0, String::new()),
    };
    DispatchResponse {
        query_status,
        session_id: job.record().session_id().to_string(),
        job_monitor: job.monitor().clone(),
        exit_status: ExitStatus {
            status: exit_code,
            message,
            job_status: status,
        },
    }
}

impl Dispatcher {
    pub fn new(store: Arc<dyn StateStore>, factory: JobFactory, backends: BackendRegistry) -> Self {
        Self {
            spaces: ScratchSpaces::new(store),
            factory,
            backends,
            restriction: Restriction::default(),
        }
    }

    /// Factory and built-in backends wired from configuration.
    pub fn from_config(store: Arc<dyn StateStore>, config: &DispatcherConfig) -> Self {
        let factory = JobFactory::new(store.clone(), config.endpoint())
            .with_multi_worker_instruments(config.multi_worker_instruments.clone());
        let backends = BackendRegistry::with_builtin(config.multi_worker_instruments.clone());
        Self::new(store, factory, backends)
    }

    pub fn with_restriction(mut self, restriction: Restriction) -> Self {
        self.restriction = restriction;
        self
    }

    pub fn spaces(&self) -> &ScratchSpaces {
        &self.spaces
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    /// Handle one poll.
    pub async fn dispatch(&self, req: &DispatchRequest) -> Result<DispatchResponse, DispatchError> {
        let backend = self
            .backends
            .get(&req.instrument)
            .ok_or_else(|| DispatchError::UnknownInstrument(req.instrument.clone()))?;
        let computed = job_id_with(&self.restriction, &req.params, req.user.as_deref());

        if req.query_status == QueryStatus::New {
            return self.submit_new(req, backend, computed).await;
        }

        let session_id = req
            .session_id
            .as_deref()
            .ok_or(DispatchError::MissingParameter("session_id"))?;
        let job_id = match req.job_id.as_deref() {
            Some(id) => {
                if id != computed {
                    tracing::warn!(
                        job_id = %id,
                        computed = %computed,
                        "poll carries a job id different from its parameters"
                    );
                }
                id.to_string()
            }
            None => computed,
        };

        let dir = self.spaces.resolve(session_id, &job_id).await?;
        let mut job = self.factory.build(&req.instrument, dir, &Map::new());
        job.refresh().await;
        tracing::debug!(
            job_id = %job_id,
            session_id = %session_id,
            query_status = %req.query_status,
            status = %job.status(),
            "poll"
        );

        if req.query_status == QueryStatus::Ready && job.status() != JobStatus::Done {
            tracing::info!(job_id = %job_id, status = %job.status(), "re-evaluating job");
            self.run_backend(backend.as_ref(), &mut job, &req.params).await?;
        }
        Ok(respond(&job))
    }

    async fn submit_new(
        &self,
        req: &DispatchRequest,
        backend: Arc<dyn AnalysisBackend>,
        job_id: String,
    ) -> Result<DispatchResponse, DispatchError> {
        let session_id = req.session_id.clone().unwrap_or_else(new_session_id);

        if let Some(job) = self.finished(&req.instrument, &session_id, &job_id).await? {
            tracing::info!(
                job_id = %job_id,
                session_id = %job.record().session_id(),
                "reusing finished job"
            );
            return Ok(respond(&job));
        }

        let dir = self.spaces.create(&session_id, &job_id, &req.params).await?;
        let mut job = self.factory.build(&req.instrument, dir, &Map::new());
        tracing::info!(
            instrument = %req.instrument,
            job_id = %job_id,
            session_id = %session_id,
            "new job"
        );
        self.run_backend(backend.as_ref(), &mut job, &req.params).await?;
        Ok(respond(&job))
    }

    /// A `done` job with this id in any session, the caller's session first.
    async fn finished(
        &self,
        instrument: &str,
        session_id: &str,
        job_id: &str,
    ) -> Result<Option<Job>, DispatchError> {
        let mut dirs: Vec<ScratchDir> = self.spaces.find_by_job(job_id).await?;
        dirs.sort_by_key(|d| d.session_id() != session_id);
        for dir in dirs {
            let mut job = self.factory.build(instrument, dir, &Map::new());
            if job.refresh().await.status == JobStatus::Done {
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    async fn run_backend(
        &self,
        backend: &dyn AnalysisBackend,
        job: &mut Job,
        params: &Map<String, Value>,
    ) -> Result<(), DispatchError> {
        let ctx = BackendContext {
            instrument: job.record().instrument_name().to_string(),
            job_id: job.record().job_id().to_string(),
            session_id: job.record().session_id().to_string(),
            work_dir: job.record().work_dir().name(),
            callback_url: job.callback_url(),
            params: params.clone(),
        };
        job.persist(Some(JobStatus::Submitted), None).await?;

        match backend.run(&ctx).await {
            Ok(BackendOutcome::Done(report)) => {
                job.persist(Some(JobStatus::Done), Some(report)).await?;
            }
            Ok(BackendOutcome::Submitted) => {}
            Ok(BackendOutcome::Failed(message)) => {
                tracing::warn!(job_id = %ctx.job_id, message = %message, "analysis failed");
                job.persist(Some(JobStatus::Failed), Some(json!({ "message": message })))
                    .await?;
            }
            Err(e) => {
                tracing::error!(job_id = %ctx.job_id, error = %e, "backend error");
                job.persist(Some(JobStatus::Failed), Some(json!({ "message": e.to_string() })))
                    .await?;
            }
        }
        Ok(())
    }

    /// Record progress pushed by a worker; returns the status written.
    pub async fn report(&self, report: &CallbackReport) -> Result<JobStatus, DispatchError> {
        let status = match report.action.as_deref() {
            Some(action) => action.parse::<JobStatus>()?,
            None => JobStatus::Progress,
        };
        let dir = self.spaces.resolve(&report.session_id, &report.job_id).await?;
        let mut job = self
            .factory
            .build(&report.instrument_name, dir, &report.params);
        job.persist(Some(status), Some(Value::Object(report.params.clone())))
            .await?;
        tracing::info!(
            job_id = %report.job_id,
            session_id = %report.session_id,
            status = %status,
            file = %job.record().file_name(),
            "worker callback"
        );
        Ok(status)
    }

    /// Remove the scratch directories of one job, or all of them.
    pub async fn clean(&self, job_id: Option<&str>) -> Result<usize, DispatchError> {
        let removed = match job_id {
            Some(id) => self.spaces.remove_job(id).await?,
            None => self.spaces.remove_all().await?,
        };
        Ok(removed)
    }
}
