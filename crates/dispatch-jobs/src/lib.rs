//! Job identity, scratch space, and job status records.
//!
//! A request's restricted parameters hash to a `job_id`; the pair
//! `(session_id, job_id)` owns one scratch directory; the [`JobFactory`]
//! picks the record kind that reads and writes status files in it.

mod aggregate;
mod callback;
mod error;
mod factory;
pub mod identity;
mod record;
mod scratch;

pub use aggregate::{aggregate, is_worker_file, MultiWorkerJob};
pub use callback::{CallbackEndpoint, DEFAULT_CALLBACK_HANDLE};
pub use error::{JobError, Result};
pub use factory::{worker_file_name, BackendKind, Job, JobFactory, DEFAULT_MULTI_WORKER_INSTRUMENTS};
pub use identity::{job_id, make_hash, restricted_params, Restriction};
pub use record::{JobRecord, DEFAULT_STATUS_FILE};
pub use scratch::{ScratchDir, ScratchSpaces, PARAMETERS_FILE};
